//! Filtering stored pages by text and derived fields.
//!
//! Fields are re-extracted from the current (possibly corrected) text on
//! every search; nothing derived is cached in the store.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::extract::ExtractedFields;
use crate::store::{PageId, PageImages, StoredPage};

/// Optional filters, all of which must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Case-insensitive substring of the page text.
    pub text: Option<String>,
    /// Substring of the extracted date of birth.
    pub dob: Option<String>,
    /// Case-insensitive substring of the occupation place or native address.
    pub place: Option<String>,
    /// Substring of the extracted salary.
    pub salary: Option<String>,
}

fn non_empty(filter: &Option<String>) -> Option<&str> {
    filter.as_deref().filter(|f| !f.is_empty())
}

impl SearchQuery {
    pub fn is_empty(&self) -> bool {
        non_empty(&self.text).is_none()
            && non_empty(&self.dob).is_none()
            && non_empty(&self.place).is_none()
            && non_empty(&self.salary).is_none()
    }

    pub fn matches(&self, text: &str, fields: &ExtractedFields) -> bool {
        if let Some(query) = non_empty(&self.text) {
            if !text.to_lowercase().contains(&query.to_lowercase()) {
                return false;
            }
        }

        if let Some(dob) = non_empty(&self.dob) {
            if !fields.dob.as_deref().is_some_and(|d| d.contains(dob)) {
                return false;
            }
        }

        if let Some(place) = non_empty(&self.place) {
            let place = place.to_lowercase();
            let in_field =
                |f: &Option<String>| f.as_deref().is_some_and(|v| v.to_lowercase().contains(&place));
            if !in_field(&fields.occupation_place) && !in_field(&fields.native_address) {
                return false;
            }
        }

        if let Some(salary) = non_empty(&self.salary) {
            if !fields.salary.as_deref().is_some_and(|s| s.contains(salary)) {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub page_id: PageId,
    pub image_path: PathBuf,
    pub source_pdf: String,
    pub local_page: u32,
    #[serde(flatten)]
    pub fields: ExtractedFields,
}

/// Pages matching `query`, in id order.
pub fn search(pages: &[StoredPage], images: &PageImages, query: &SearchQuery) -> Vec<SearchHit> {
    pages
        .iter()
        .filter_map(|page| {
            let fields = ExtractedFields::from_text(&page.record.text);
            query.matches(&page.record.text, &fields).then(|| SearchHit {
                page_id: page.page_id,
                image_path: images.path_for(page.page_id),
                source_pdf: page.record.source_pdf.clone(),
                local_page: page.record.local_page,
                fields,
            })
        })
        .collect()
}
