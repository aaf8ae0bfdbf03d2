//! Google Cloud Vision `images:annotate` backend.
//!
//! The API key is resolved once at construction from the config's inline
//! value, key file or environment variable. Without a key the backend
//! reports itself unavailable.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{normalize_whitespace, OcrBackend, OcrError};
use crate::config::{CloudOcrConfig, OcrBackendKind};
use crate::secrets::resolve_secret_optional;

pub struct VisionBackend {
    endpoint: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<ImageRequest>,
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
    error: Option<VisionError>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(rename = "fullTextAnnotation")]
    full_text_annotation: Option<TextAnnotation>,
    error: Option<VisionError>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct VisionError {
    #[serde(default)]
    message: String,
}

impl VisionBackend {
    pub fn from_config(config: &CloudOcrConfig) -> Self {
        let api_key = match resolve_secret_optional(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env_var.as_deref(),
        ) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!(error = %e, "Cloud OCR key not configured");
                None
            }
        };

        Self::new(&config.endpoint, api_key, Duration::from_secs(config.timeout_secs))
    }

    pub fn new(endpoint: &str, api_key: Option<SecretString>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key,
            timeout,
        }
    }

    fn build_request(image_data: &[u8]) -> AnnotateRequest {
        AnnotateRequest {
            requests: vec![ImageRequest {
                image: ImageContent {
                    content: base64::engine::general_purpose::STANDARD.encode(image_data),
                },
                features: vec![Feature {
                    kind: "TEXT_DETECTION",
                }],
            }],
        }
    }

    fn parse_response(body: &str) -> Result<String, OcrError> {
        let response: AnnotateResponse = serde_json::from_str(body)
            .map_err(|e| OcrError::Failed(format!("Invalid Vision response: {}", e)))?;

        if let Some(error) = response.error {
            return Err(OcrError::Failed(format!("Vision API error: {}", error.message)));
        }

        let first = response
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::Failed("Vision response contained no results".to_string()))?;

        if let Some(error) = first.error {
            return Err(OcrError::Failed(format!("Vision API error: {}", error.message)));
        }

        first
            .full_text_annotation
            .map(|annotation| normalize_whitespace(&annotation.text))
            .ok_or_else(|| OcrError::Failed("Vision response had no text annotation".to_string()))
    }
}

impl OcrBackend for VisionBackend {
    fn kind(&self) -> OcrBackendKind {
        OcrBackendKind::Cloud
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        let _span = tracing::debug_span!("ocr.cloud").entered();

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| OcrError::NotAvailable("no cloud OCR API key configured".to_string()))?;

        let data = std::fs::read(image).map_err(|e| OcrError::ReadImage {
            path: image.to_path_buf(),
            source: e,
        })?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| OcrError::Failed(format!("Failed to build HTTP client: {}", e)))?;

        let response = client
            .post(&self.endpoint)
            .query(&[("key", api_key.expose_secret())])
            .json(&Self::build_request(&data))
            .send()
            .map_err(|e| OcrError::Failed(format!("Vision request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| OcrError::Failed(format!("Failed to read Vision response: {}", e)))?;

        if !status.is_success() {
            // Error bodies carry a message worth surfacing.
            return match Self::parse_response(&body) {
                Err(e) => Err(e),
                Ok(_) => Err(OcrError::Failed(format!("Vision API returned {}", status))),
            };
        }

        Self::parse_response(&body)
    }
}
