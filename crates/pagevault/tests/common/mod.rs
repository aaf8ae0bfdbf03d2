//! Shared test utilities for pagevault integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated libraries rooted in temp directories
//! - Fake rasterizer and OCR backends so no poppler, tesseract or network
//!   is needed
//! - lopdf-built fixture PDFs whose pages carry their own "scanned" text

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::{fixture_pdf, wait_until, TestHarness};
