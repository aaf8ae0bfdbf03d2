//! Rendering PDF pages to raster images.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::RasterError;

pub mod poppler;

pub use poppler::PopplerRasterizer;

pub trait PageRasterizer: Send + Sync {
    /// Number of pages in `pdf`. Fails with `UnreadablePdf` when the
    /// document cannot be opened.
    fn page_count(&self, pdf: &Path) -> Result<u32, RasterError>;

    /// Renders 1-based `page` into `out_dir` and returns the image path.
    fn render_page(&self, pdf: &Path, page: u32, out_dir: &Path) -> Result<PathBuf, RasterError>;
}

/// A rendered page waiting in the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPage {
    /// 1-based page number within the source PDF.
    pub page: u32,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterProgress {
    PageCount(u32),
    Rendered(u32),
}

#[derive(Debug)]
pub enum RasterOutcome {
    Complete(Vec<RasterPage>),
    /// Cancellation was observed; holds the pages rendered before it.
    Cancelled(Vec<RasterPage>),
}

/// Renders every page of `pdf` into `out_dir`, in page order.
///
/// `cancel` is checked before each page. Rendered files are left in
/// `out_dir`; the caller owns their cleanup.
pub fn rasterize<F>(
    rasterizer: &dyn PageRasterizer,
    pdf: &Path,
    out_dir: &Path,
    cancel: &AtomicBool,
    mut progress: F,
) -> Result<RasterOutcome, RasterError>
where
    F: FnMut(RasterProgress),
{
    std::fs::create_dir_all(out_dir).map_err(|e| RasterError::OutputDirectory {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let count = rasterizer.page_count(pdf)?;
    progress(RasterProgress::PageCount(count));

    let mut pages = Vec::with_capacity(count as usize);
    for page in 1..=count {
        if cancel.load(Ordering::SeqCst) {
            tracing::info!(rendered = pages.len(), total = count, "rasterization cancelled");
            return Ok(RasterOutcome::Cancelled(pages));
        }

        let path = rasterizer.render_page(pdf, page, out_dir)?;
        tracing::debug!(page, "rendered page");
        pages.push(RasterPage { page, path });
        progress(RasterProgress::Rendered(page));
    }

    Ok(RasterOutcome::Complete(pages))
}
