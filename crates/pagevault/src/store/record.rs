use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Numeric page identifier. Rendered as a decimal string in file names,
/// JSON keys and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl PageId {
    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> PageId {
        PageId(self.0 + 1)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(PageId)
    }
}

impl From<u64> for PageId {
    fn from(value: u64) -> Self {
        PageId(value)
    }
}

/// One stored, de-duplicated page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Current text; may be corrected after ingestion.
    pub text: String,
    /// OCR output as first recognized.
    pub original_text: String,
    pub source_pdf: String,
    /// 1-based page index within `source_pdf`.
    pub local_page: u32,
    /// SHA-256 hex digest of the stored page image.
    pub image_hash: String,
}

impl PageRecord {
    pub fn new(text: String, source_pdf: &str, local_page: u32, image_hash: String) -> Self {
        Self {
            original_text: text.clone(),
            text,
            source_pdf: source_pdf.to_string(),
            local_page,
            image_hash,
        }
    }

    pub fn is_corrected(&self) -> bool {
        self.text != self.original_text
    }
}

/// A record together with its id, as returned by snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPage {
    pub page_id: PageId,
    #[serde(flatten)]
    pub record: PageRecord,
}
