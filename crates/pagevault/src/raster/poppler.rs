use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::RasterError;
use crate::raster::PageRasterizer;

/// Counts pages with lopdf (falling back to `pdfinfo`) and renders them with
/// poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PopplerRasterizer {
    dpi: u32,
    pdftoppm: PathBuf,
}

impl PopplerRasterizer {
    pub fn new(dpi: u32, pdftoppm: impl Into<PathBuf>) -> Self {
        Self {
            dpi,
            pdftoppm: pdftoppm.into(),
        }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }
}

impl Default for PopplerRasterizer {
    fn default() -> Self {
        Self::new(300, "pdftoppm")
    }
}

fn unreadable(path: &Path, reason: impl Into<String>) -> RasterError {
    RasterError::UnreadablePdf {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

impl PageRasterizer for PopplerRasterizer {
    fn page_count(&self, pdf: &Path) -> Result<u32, RasterError> {
        let _span = tracing::info_span!("raster.page_count").entered();

        let count = match lopdf::Document::load(pdf) {
            Ok(doc) => {
                if doc.is_encrypted() {
                    return Err(unreadable(pdf, "document is encrypted"));
                }
                doc.get_pages().len() as u32
            }
            Err(e) => {
                // lopdf rejects some damaged cross-reference tables that poppler can still read.
                tracing::warn!(
                    "lopdf failed to parse {}: {}. Falling back to pdfinfo.",
                    crate::sanitize::redact_path(pdf),
                    e
                );
                count_with_pdfinfo(pdf).map_err(|reason| {
                    unreadable(pdf, format!("{}; pdfinfo: {}", e, reason))
                })?
            }
        };

        if count == 0 {
            return Err(unreadable(pdf, "document has no pages"));
        }
        Ok(count)
    }

    fn render_page(&self, pdf: &Path, page: u32, out_dir: &Path) -> Result<PathBuf, RasterError> {
        let _span = tracing::info_span!("raster.render_page", page).entered();
        let render_err = |reason: String| RasterError::Render {
            path: pdf.to_path_buf(),
            page,
            reason,
        };

        let prefix = out_dir.join(format!("render-{}", uuid::Uuid::new_v4()));
        let page_arg = page.to_string();

        let output = Command::new(&self.pdftoppm)
            .args(["-png", "-r", &self.dpi.to_string(), "-f", &page_arg, "-l", &page_arg])
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                render_err(format!(
                    "failed to run {}: {}. Make sure poppler-utils is installed.",
                    self.pdftoppm.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(render_err(format!(
                "pdftoppm failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // pdftoppm zero-pads the page suffix to the width of the page count.
        let prefix_str = prefix.display().to_string();
        [
            format!("{}-{}.png", prefix_str, page),
            format!("{}-{:02}.png", prefix_str, page),
            format!("{}-{:03}.png", prefix_str, page),
            format!("{}-{:04}.png", prefix_str, page),
        ]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| render_err("rendered page image not found".to_string()))
    }
}

/// Reads the `Pages:` line from `pdfinfo`.
fn count_with_pdfinfo(pdf: &Path) -> Result<u32, String> {
    let output = Command::new("pdfinfo")
        .arg(pdf)
        .output()
        .map_err(|e| format!("failed to run pdfinfo: {}", e))?;

    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse::<u32>().ok())
        .ok_or_else(|| "no page count in pdfinfo output".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object, Stream};

    /// Builds a PDF with `pages` text pages.
    fn build_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for n in 0..pages {
            let content = format!("BT /F1 12 Tf 50 700 Td (Page {}) Tj ET", n + 1);
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_page_count_from_lopdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three.pdf");
        std::fs::write(&path, build_pdf(3)).unwrap();

        let rasterizer = PopplerRasterizer::default();
        assert_eq!(rasterizer.page_count(&path).unwrap(), 3);
    }

    #[test]
    fn test_corrupt_pdf_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a valid pdf content").unwrap();

        let result = PopplerRasterizer::default().page_count(&path);
        assert!(matches!(result, Err(RasterError::UnreadablePdf { .. })));
    }

    #[test]
    fn test_missing_pdf_is_unreadable() {
        let result = PopplerRasterizer::default().page_count(Path::new("/nonexistent/doc.pdf"));
        assert!(matches!(result, Err(RasterError::UnreadablePdf { .. })));
    }

    #[test]
    fn test_missing_renderer_reports_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.pdf");
        std::fs::write(&path, build_pdf(1)).unwrap();

        let rasterizer = PopplerRasterizer::new(150, "/nonexistent/bin/pdftoppm");
        let result = rasterizer.render_page(&path, 1, dir.path());
        match result {
            Err(RasterError::Render { page, reason, .. }) => {
                assert_eq!(page, 1);
                assert!(reason.contains("failed to run"));
            }
            other => panic!("Expected Render error, got {:?}", other),
        }
    }

    #[test]
    fn test_dpi_is_configurable() {
        assert_eq!(PopplerRasterizer::new(200, "pdftoppm").dpi(), 200);
        assert_eq!(PopplerRasterizer::default().dpi(), 300);
    }
}
