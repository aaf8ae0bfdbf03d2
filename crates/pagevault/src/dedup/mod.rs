//! Duplicate detection against the pages already in the store.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::store::{PageId, StoredPage};

/// SHA-256 hex digest of raw image bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 hex digest of a file's contents.
pub fn file_hash(path: &Path) -> std::io::Result<String> {
    Ok(content_hash(&std::fs::read(path)?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
    IdenticalImage,
    /// Word overlap above the threshold, as a truncated percentage.
    SameText { percent: u32 },
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateReason::IdenticalImage => write!(f, "identical image"),
            DuplicateReason::SameText { percent } => write!(f, "same text ({}% match)", percent),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Unique,
    Duplicate {
        reason: DuplicateReason,
        matched: PageId,
    },
}

impl Verdict {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Verdict::Duplicate { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DuplicateDetector {
    threshold: f64,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self { threshold: 0.9 }
    }
}

impl DuplicateDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Checks a new page against `existing`.
    ///
    /// An identical image anywhere in `existing` wins over any text match.
    /// Otherwise the first page, in the given order, whose similarity is
    /// strictly above the threshold is reported.
    pub fn check(&self, image_hash: &str, text: &str, existing: &[StoredPage]) -> Verdict {
        if let Some(page) = existing.iter().find(|p| p.record.image_hash == image_hash) {
            return Verdict::Duplicate {
                reason: DuplicateReason::IdenticalImage,
                matched: page.page_id,
            };
        }

        let words = WordSet::new(text);
        for page in existing {
            let similarity = words.similarity(&WordSet::new(&page.record.text));
            if similarity > self.threshold {
                return Verdict::Duplicate {
                    reason: DuplicateReason::SameText {
                        percent: (similarity * 100.0) as u32,
                    },
                    matched: page.page_id,
                };
            }
        }

        Verdict::Unique
    }
}

/// Lowercased distinct words of a text plus its raw word count.
struct WordSet {
    words: HashSet<String>,
    count: usize,
}

impl WordSet {
    fn new(text: &str) -> Self {
        Self {
            words: text.split_whitespace().map(str::to_lowercase).collect(),
            count: text.split_whitespace().count(),
        }
    }

    /// Shared distinct words over the larger raw word count (at least 1).
    fn similarity(&self, other: &WordSet) -> f64 {
        let shared = self.words.intersection(&other.words).count();
        shared as f64 / self.count.max(other.count).max(1) as f64
    }
}

/// Word-overlap ratio between two texts, as used for duplicate detection.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    WordSet::new(a).similarity(&WordSet::new(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PageRecord;

    fn page(id: u64, text: &str, hash: &str) -> StoredPage {
        StoredPage {
            page_id: PageId(id),
            record: PageRecord::new(text.to_string(), "old.pdf", 1, hash.to_string()),
        }
    }

    fn words(prefix: &str, range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_file_hash_matches_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        std::fs::write(&path, b"raster").unwrap();
        assert_eq!(file_hash(&path).unwrap(), content_hash(b"raster"));
    }

    #[test]
    fn test_unique_against_empty_store() {
        let detector = DuplicateDetector::default();
        assert_eq!(detector.check("h", "some text", &[]), Verdict::Unique);
    }

    #[test]
    fn test_identical_image() {
        let detector = DuplicateDetector::default();
        let existing = vec![page(1, "unrelated words here", "aaa"), page(2, "other", "bbb")];
        let verdict = detector.check("bbb", "completely new", &existing);
        assert_eq!(
            verdict,
            Verdict::Duplicate {
                reason: DuplicateReason::IdenticalImage,
                matched: PageId(2)
            }
        );
    }

    #[test]
    fn test_image_match_takes_priority_over_earlier_text_match() {
        let detector = DuplicateDetector::default();
        let text = "name ravi kumar dob 1/1/1990 native guntur";
        // Page 1 has the same text but a different image; page 2 the same image.
        let existing = vec![page(1, text, "other-hash"), page(2, "blank", "same-hash")];
        let verdict = detector.check("same-hash", text, &existing);
        assert_eq!(
            verdict,
            Verdict::Duplicate {
                reason: DuplicateReason::IdenticalImage,
                matched: PageId(2)
            }
        );
    }

    #[test]
    fn test_same_text_reason_percent() {
        let detector = DuplicateDetector::default();
        let existing = vec![page(4, "Alpha beta gamma delta", "x")];
        let verdict = detector.check("y", "alpha BETA gamma delta", &existing);
        assert_eq!(
            verdict,
            Verdict::Duplicate {
                reason: DuplicateReason::SameText { percent: 100 },
                matched: PageId(4)
            }
        );
        if let Verdict::Duplicate { reason, .. } = verdict {
            assert_eq!(reason.to_string(), "same text (100% match)");
        }
    }

    #[test]
    fn test_exactly_threshold_is_not_duplicate() {
        let detector = DuplicateDetector::default();
        let existing_words = words("w", 0..10);
        let mut new_words = words("w", 0..9);
        new_words.push("different".to_string());

        let ratio = text_similarity(&new_words.join(" "), &existing_words.join(" "));
        assert_eq!(ratio, 0.9);

        let existing = vec![page(1, &existing_words.join(" "), "x")];
        assert_eq!(
            detector.check("y", &new_words.join(" "), &existing),
            Verdict::Unique
        );
    }

    #[test]
    fn test_just_above_threshold_is_duplicate() {
        let detector = DuplicateDetector::default();
        let existing_words = words("w", 0..1000);
        let mut new_words = words("w", 0..901);
        new_words.extend(words("x", 0..99));

        let existing = vec![page(1, &existing_words.join(" "), "x")];
        let verdict = detector.check("y", &new_words.join(" "), &existing);
        assert_eq!(
            verdict,
            Verdict::Duplicate {
                reason: DuplicateReason::SameText { percent: 90 },
                matched: PageId(1)
            }
        );
    }

    #[test]
    fn test_repeated_words_count_towards_denominator() {
        // Two distinct shared words over four raw words.
        assert_eq!(text_similarity("a a b b", "a b"), 0.5);
    }

    #[test]
    fn test_empty_texts_are_not_similar() {
        assert_eq!(text_similarity("", ""), 0.0);
        let detector = DuplicateDetector::default();
        let existing = vec![page(1, "", "x")];
        assert_eq!(detector.check("y", "", &existing), Verdict::Unique);
    }

    #[test]
    fn test_custom_threshold() {
        let detector = DuplicateDetector::new(0.5);
        let existing = vec![page(1, "one two three four", "x")];
        assert!(detector
            .check("y", "one two three nine", &existing)
            .is_duplicate());
    }
}
