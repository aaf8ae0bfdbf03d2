//! Command-line parser and command implementations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use pagevault::config::{default_config_path, load_config, load_config_or_default};
use pagevault::{
    Config, IngestEvent, JobStatus, Library, PageId, PageView, ProgressReport, SearchHit,
    SearchQuery,
};
use tokio::sync::broadcast::error::RecvError;

use crate::error::CliError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "pagevault")]
#[command(about = "Ingest scanned PDF registers into a searchable page library")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ~/.pagevault/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one or more PDF files, following progress until each finishes
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Search stored pages; all given filters must match
    Search {
        /// Substring of the page text (case-insensitive)
        #[arg(long)]
        text: Option<String>,
        /// Substring of the date of birth
        #[arg(long)]
        dob: Option<String>,
        /// Substring of the occupation place or native address
        #[arg(long)]
        place: Option<String>,
        /// Substring of the salary
        #[arg(long)]
        salary: Option<String>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one stored page
    Show {
        id: PageId,
        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored page and its image
    Delete { id: PageId },

    /// Replace a page's text, keeping the original OCR output
    Correct { id: PageId, text: String },
}

fn resolve_config(path: Option<&Path>) -> Result<Config, CliError> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => match default_config_path() {
            Some(path) => Ok(load_config_or_default(path)?),
            None => Ok(Config::default()),
        },
    }
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    let config = resolve_config(cli.config.as_deref())?;
    let library = Arc::new(Library::open(config)?);

    match cli.command {
        Commands::Ingest { files } => ingest(library, &files),
        Commands::Search {
            text,
            dob,
            place,
            salary,
            json,
        } => {
            let query = SearchQuery {
                text,
                dob,
                place,
                salary,
            };
            let hits = library.search(&query)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_hits(&hits);
            }
            Ok(())
        }
        Commands::Show { id, json } => {
            let page = library.view(id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                print_page(&page);
            }
            Ok(())
        }
        Commands::Delete { id } => {
            library.delete(id)?;
            println!("Deleted page {}", id);
            Ok(())
        }
        Commands::Correct { id, text } => {
            library.update_text(id, &text)?;
            println!("Updated text of page {}", id);
            Ok(())
        }
    }
}

fn ingest(library: Arc<Library>, files: &[PathBuf]) -> Result<(), CliError> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let handler_library = Arc::clone(&library);
    let handler_flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
        let cancelled = handler_library.cancel_all();
        eprintln!("Cancelling {} running job(s)...", cancelled);
    })?;

    ingest_files(&library, files, &interrupted)
}

/// Ingests `files` one after another. Once `interrupted` is set, no further
/// file is submitted and the rest count as not ingested.
fn ingest_files(
    library: &Library,
    files: &[PathBuf],
    interrupted: &AtomicBool,
) -> Result<(), CliError> {
    let mut failed = 0;
    for (index, path) in files.iter().enumerate() {
        if interrupted.load(Ordering::SeqCst) {
            let remaining = files.len() - index;
            eprintln!("Interrupted, skipping {} remaining file(s)", remaining);
            failed += remaining;
            break;
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                let err = CliError::ReadInput {
                    path: path.clone(),
                    source: e,
                };
                eprintln!("{}", err);
                failed += 1;
                continue;
            }
        };

        let mut events = library.subscribe();
        let job_id = match library.submit_upload(&filename, &data) {
            Ok(id) => id,
            Err(e) => {
                eprintln!("{}: {}", filename, e);
                failed += 1;
                continue;
            }
        };

        eprintln!("{}: ingesting (job {})", filename, job_id);
        follow(&mut events, &job_id);

        let report = library.wait(&job_id)?;
        print_summary(&report);
        if report.status == JobStatus::Error {
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(CliError::IngestFailed {
            failed,
            total: files.len(),
        });
    }
    Ok(())
}

/// Prints progress for `job_id` until its job finishes.
fn follow(events: &mut tokio::sync::broadcast::Receiver<IngestEvent>, job_id: &str) {
    loop {
        match events.blocking_recv() {
            Ok(event) if event.job_id() != job_id => continue,
            Ok(IngestEvent::Finished { .. }) | Err(RecvError::Closed) => return,
            Ok(event) => print_event(&event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "progress events dropped");
            }
        }
    }
}

fn print_event(event: &IngestEvent) {
    match event {
        IngestEvent::StatusChanged { status, .. } => eprintln!("  {}", status),
        IngestEvent::PageCount { total_pages, .. } => eprintln!("  {} pages", total_pages),
        IngestEvent::PageAccepted {
            local_page,
            preview,
            ..
        } => {
            let mut details = Vec::new();
            if let Some(dob) = &preview.dob {
                details.push(format!("dob {}", dob));
            }
            if let Some(place) = &preview.occupation_place {
                details.push(format!("works {}", place));
            }
            if let Some(native) = &preview.native_address {
                details.push(format!("native {}", native));
            }
            if details.is_empty() {
                eprintln!("  page {}: stored as #{}", local_page, preview.page_id);
            } else {
                eprintln!(
                    "  page {}: stored as #{} ({})",
                    local_page,
                    preview.page_id,
                    details.join(", ")
                );
            }
        }
        IngestEvent::PageSkipped {
            local_page,
            reason,
            matched,
            ..
        } => eprintln!(
            "  page {}: duplicate of #{} ({})",
            local_page, matched, reason
        ),
        IngestEvent::Finished { .. } => {}
    }
}

fn print_summary(report: &ProgressReport) {
    println!(
        "{}: {} - {} of {} pages added, {} duplicates skipped ({:.1}s)",
        report.filename,
        report.status,
        report.pages_added,
        report.total_pages,
        report.duplicates_skipped,
        report.elapsed_secs
    );
    if let Some(error) = &report.error {
        println!("  error: {}", error);
    }
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No matching pages");
        return;
    }

    println!(
        "{:>6}  {:<24}  {:>4}  {:<12}  {:<20}  {:<20}  {}",
        "ID", "SOURCE", "PAGE", "DOB", "PLACE", "NATIVE", "SALARY"
    );
    for hit in hits {
        println!(
            "{:>6}  {:<24}  {:>4}  {:<12}  {:<20}  {:<20}  {}",
            hit.page_id,
            hit.source_pdf,
            hit.local_page,
            or_dash(&hit.fields.dob),
            or_dash(&hit.fields.occupation_place),
            or_dash(&hit.fields.native_address),
            or_dash(&hit.fields.salary),
        );
    }
    println!("{} page(s)", hits.len());
}

fn print_page(page: &PageView) {
    println!("Page {}", page.page_id);
    println!("  Source:     {} (page {})", page.record.source_pdf, page.record.local_page);
    println!("  Image:      {}", page.image_path.display());
    println!("  DOB:        {}", or_dash(&page.fields.dob));
    println!("  Occupation: {}", or_dash(&page.fields.occupation_place));
    println!("  Native:     {}", or_dash(&page.fields.native_address));
    println!("  Salary:     {}", or_dash(&page.fields.salary));
    if page.record.is_corrected() {
        println!("  (text corrected; original OCR output preserved)");
    }
    println!();
    println!("{}", page.record.text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_filters() {
        let cli = Cli::try_parse_from([
            "pagevault", "search", "--dob", "1990", "--place", "tenali", "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                dob, place, json, text, ..
            } => {
                assert_eq!(dob.as_deref(), Some("1990"));
                assert_eq!(place.as_deref(), Some("tenali"));
                assert!(text.is_none());
                assert!(json);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_parse_page_id_and_globals() {
        let cli = Cli::try_parse_from(["pagevault", "-vv", "--log-format", "json", "show", "42"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Show { id: PageId(42), json: false }));
    }

    #[test]
    fn test_rejects_non_numeric_page_id() {
        assert!(Cli::try_parse_from(["pagevault", "delete", "abc"]).is_err());
    }

    #[test]
    fn test_ingest_requires_files() {
        assert!(Cli::try_parse_from(["pagevault", "ingest"]).is_err());
    }

    fn scratch_library(dir: &Path) -> Library {
        Library::open(Config::with_data_directory(dir.join("data"))).unwrap()
    }

    #[test]
    fn test_interrupted_ingest_submits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let library = scratch_library(dir.path());
        let files = vec![dir.path().join("a.pdf"), dir.path().join("b.pdf")];
        for file in &files {
            std::fs::write(file, b"%PDF-1.4\n%%EOF\n").unwrap();
        }

        let interrupted = AtomicBool::new(true);
        let result = ingest_files(&library, &files, &interrupted);

        assert!(matches!(
            result,
            Err(CliError::IngestFailed { failed: 2, total: 2 })
        ));
        assert_eq!(library.page_count().unwrap(), 0);
        let uploads = std::fs::read_dir(library.config().upload_path()).unwrap();
        assert_eq!(uploads.count(), 0);
    }

    #[test]
    fn test_ingest_counts_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let library = scratch_library(dir.path());
        let files = vec![dir.path().join("missing.pdf")];

        let result = ingest_files(&library, &files, &AtomicBool::new(false));
        assert!(matches!(
            result,
            Err(CliError::IngestFailed { failed: 1, total: 1 })
        ));
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_config(Some(&dir.path().join("missing.json")));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"version": "1.0", "data_directory": "/srv/vault", "raster": {"dpi": 200}}"#,
        )
        .unwrap();
        let config = resolve_config(Some(&path)).unwrap();
        assert_eq!(config.raster.dpi, 200);
        assert_eq!(config.data_directory, "/srv/vault");
    }
}
