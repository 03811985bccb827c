//! Recognition engines
//!
//! A recognition engine turns a normalized page image into text. Every engine
//! offers the same two operations so the page extractor and layout parser stay
//! backend-agnostic:
//!
//! - `extract_plain_text` - recognized text only
//! - `extract_positional_text` - word-level boxes for layout reconstruction
//!
//! ## Available Engines
//!
//! - `TesseractEngine` - local Tesseract binary, positional output as hOCR
//! - `AzureReadEngine` - Azure Document Intelligence `prebuilt-read`
//!
//! Engines never retry. Escalation belongs to the page extractor.

pub mod azure;
pub mod hocr;
pub mod tesseract;

use crate::config::{RecognitionBackendKind, RecognitionConfig};
use crate::error::RecognitionError;
use crate::types::RecognizedWord;
use image::GrayImage;
use std::time::Duration;

pub use azure::AzureReadEngine;
pub use tesseract::TesseractEngine;

/// Positional output of one recognition call
#[derive(Debug, Clone, PartialEq)]
pub enum PositionalText {
    /// Raw hOCR markup, parsed lazily by [`hocr::parse_hocr_words`]
    Hocr(String),
    /// Words already resolved by the engine
    Words(Vec<RecognizedWord>),
}

impl PositionalText {
    pub fn into_words(self) -> Vec<RecognizedWord> {
        match self {
            PositionalText::Hocr(markup) => hocr::parse_hocr_words(&markup),
            PositionalText::Words(words) => words,
        }
    }
}

pub trait RecognitionEngine: Send + Sync {
    fn extract_plain_text(
        &self,
        image: &GrayImage,
        timeout: Duration,
    ) -> Result<String, RecognitionError>;

    fn extract_positional_text(
        &self,
        image: &GrayImage,
        timeout: Duration,
    ) -> Result<PositionalText, RecognitionError>;

    /// Engine identifier for logging
    fn name(&self) -> &str;
}

/// Backend enum for configuration-driven engine selection
pub enum RecognitionBackend {
    Local(TesseractEngine),
    Cloud(AzureReadEngine),
}

impl RecognitionBackend {
    pub fn from_config(config: &RecognitionConfig) -> anyhow::Result<Self> {
        match config.backend {
            RecognitionBackendKind::Local => Ok(RecognitionBackend::Local(TesseractEngine::new(
                config.local.clone(),
                config.char_whitelist.clone(),
            ))),
            RecognitionBackendKind::Cloud => Ok(RecognitionBackend::Cloud(
                AzureReadEngine::from_config(&config.cloud)?,
            )),
        }
    }
}

impl RecognitionEngine for RecognitionBackend {
    fn extract_plain_text(
        &self,
        image: &GrayImage,
        timeout: Duration,
    ) -> Result<String, RecognitionError> {
        match self {
            RecognitionBackend::Local(engine) => engine.extract_plain_text(image, timeout),
            RecognitionBackend::Cloud(engine) => engine.extract_plain_text(image, timeout),
        }
    }

    fn extract_positional_text(
        &self,
        image: &GrayImage,
        timeout: Duration,
    ) -> Result<PositionalText, RecognitionError> {
        match self {
            RecognitionBackend::Local(engine) => engine.extract_positional_text(image, timeout),
            RecognitionBackend::Cloud(engine) => engine.extract_positional_text(image, timeout),
        }
    }

    fn name(&self) -> &str {
        match self {
            RecognitionBackend::Local(engine) => engine.name(),
            RecognitionBackend::Cloud(engine) => engine.name(),
        }
    }
}

/// PNG-encode a page for engines that take image bytes
pub(crate) fn encode_png(image: &GrayImage) -> Result<Vec<u8>, RecognitionError> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image.write_to(&mut bytes, image::ImageFormat::Png)?;
    Ok(bytes.into_inner())
}
