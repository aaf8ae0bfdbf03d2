//! Page repository: CRUD operations for the `pages` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::store::{PageId, PageRecord, StoredPage};

const COLUMNS: &str = "page_id, text, original_text, source_pdf, local_page, image_hash";

fn from_row(row: &Row<'_>) -> Result<(i64, PageRecord), rusqlite::Error> {
    Ok((
        row.get("page_id")?,
        PageRecord {
            text: row.get("text")?,
            original_text: row.get("original_text")?,
            source_pdf: row.get("source_pdf")?,
            local_page: row.get("local_page")?,
            image_hash: row.get("image_hash")?,
        },
    ))
}

fn to_sql_id(id: PageId) -> Result<i64, DatabaseError> {
    i64::try_from(id.get()).map_err(|_| DatabaseError::InvalidRow {
        table: "pages",
        reason: format!("page id {} does not fit in INTEGER", id),
    })
}

fn from_sql_id(raw: i64) -> Result<PageId, DatabaseError> {
    u64::try_from(raw)
        .map(PageId)
        .map_err(|_| DatabaseError::InvalidRow {
            table: "pages",
            reason: format!("negative page id {}", raw),
        })
}

/// Inserts a page or replaces the row with the same id. New rows go to the
/// end of the insertion order; a replaced row keeps its `insert_seq`.
pub fn upsert(db: &Database, id: PageId, record: &PageRecord) -> Result<(), DatabaseError> {
    let sql_id = to_sql_id(id)?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO pages
                (page_id, text, original_text, source_pdf, local_page, image_hash, insert_seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                (SELECT COALESCE(MAX(insert_seq), 0) + 1 FROM pages))
             ON CONFLICT(page_id) DO UPDATE SET
                text = excluded.text,
                original_text = excluded.original_text,
                source_pdf = excluded.source_pdf,
                local_page = excluded.local_page,
                image_hash = excluded.image_hash,
                updated_at = datetime('now')",
            params![
                sql_id,
                record.text,
                record.original_text,
                record.source_pdf,
                record.local_page,
                record.image_hash,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: PageId) -> Result<Option<PageRecord>, DatabaseError> {
    let sql_id = to_sql_id(id)?;
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM pages WHERE page_id = ?1", COLUMNS),
                params![sql_id],
                from_row,
            )
            .optional()?;
        Ok(row.map(|(_, record)| record))
    })
}

/// Deletes a page. Returns whether a row was removed.
pub fn delete(db: &Database, id: PageId) -> Result<bool, DatabaseError> {
    let sql_id = to_sql_id(id)?;
    db.with_conn(|conn| {
        let affected = conn.execute("DELETE FROM pages WHERE page_id = ?1", params![sql_id])?;
        Ok(affected > 0)
    })
}

/// All pages in insertion order.
pub fn list_all(db: &Database) -> Result<Vec<StoredPage>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM pages ORDER BY insert_seq ASC, page_id ASC",
            COLUMNS
        ))?;
        let rows = stmt
            .query_map([], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    rows.into_iter()
        .map(|(raw, record)| {
            Ok(StoredPage {
                page_id: from_sql_id(raw)?,
                record,
            })
        })
        .collect()
}

pub fn count(db: &Database) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |r| r.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    })
}

pub fn exists(db: &Database, id: PageId) -> Result<bool, DatabaseError> {
    let sql_id = to_sql_id(id)?;
    db.with_conn(|conn| {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM pages WHERE page_id = ?1",
                params![sql_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    })
}
