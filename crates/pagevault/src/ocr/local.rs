use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;

use super::{normalize_whitespace, OcrBackend, OcrError};
use crate::config::OcrBackendKind;

/// Local Tesseract engine via leptess.
pub struct TesseractBackend {
    languages: String,
    available: OnceLock<bool>,
}

impl TesseractBackend {
    pub fn new(languages: &[String]) -> Self {
        let languages = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            languages,
            available: OnceLock::new(),
        }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }

    fn engine(&self) -> Result<leptess::LepTess, OcrError> {
        leptess::LepTess::new(None, &self.languages)
            .map_err(|e| OcrError::NotAvailable(format!("Failed to initialize Tesseract: {}", e)))
    }

    /// Grayscale PNG bytes, the form Tesseract reads most reliably.
    fn prepare(image_data: &[u8]) -> Result<Vec<u8>, OcrError> {
        let img = image::load_from_memory(image_data)
            .map_err(|e| OcrError::Image(format!("Failed to load image: {}", e)))?;

        let gray = image::DynamicImage::ImageLuma8(img.to_luma8());
        let mut png_data = Vec::new();
        gray.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| OcrError::Image(format!("Failed to convert image: {}", e)))?;
        Ok(png_data)
    }

    pub fn recognize_bytes(&self, image_data: &[u8]) -> Result<String, OcrError> {
        let png_data = Self::prepare(image_data)?;

        let mut lt = self.engine()?;
        lt.set_image_from_mem(&png_data)
            .map_err(|e| OcrError::Failed(format!("Failed to set image for OCR: {}", e)))?;

        let text = lt
            .get_utf8_text()
            .map_err(|e| OcrError::Failed(format!("Tesseract failed: {}", e)))?;

        Ok(normalize_whitespace(&text))
    }
}

impl OcrBackend for TesseractBackend {
    fn kind(&self) -> OcrBackendKind {
        OcrBackendKind::Local
    }

    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| match self.engine() {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(languages = %self.languages, error = %e, "Tesseract not available");
                false
            }
        })
    }

    fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        let _span = tracing::debug_span!("ocr.local").entered();

        let data = std::fs::read(image).map_err(|e| OcrError::ReadImage {
            path: image.to_path_buf(),
            source: e,
        })?;
        self.recognize_bytes(&data)
    }
}
