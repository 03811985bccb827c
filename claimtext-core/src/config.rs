use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_initial_timeout_secs() -> u64 {
    30
}

fn default_retry_timeout_secs() -> u64 {
    60
}

/// Letters, digits, currency and the punctuation seen on claim forms
pub const DEFAULT_CHAR_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789$abcdefghijklmnopqrstuvwxyz[]().,@";

fn default_char_whitelist() -> Option<String> {
    Some(DEFAULT_CHAR_WHITELIST.to_string())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

impl ExtractionConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ExtractionConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn load_with_fallback(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                tracing::warn!(path = p, error = %e, "failed to load config, using defaults");
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

// ===== RECOGNITION =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionBackendKind {
    /// Tesseract on the local machine
    #[default]
    Local,
    /// Azure Document Intelligence read model
    Cloud,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    #[serde(default)]
    pub backend: RecognitionBackendKind,
    /// Budget for the first positional attempt on a page
    #[serde(default = "default_initial_timeout_secs")]
    pub initial_timeout_secs: u64,
    /// Budget for the retry and the plain-text fallback
    #[serde(default = "default_retry_timeout_secs")]
    pub retry_timeout_secs: u64,
    /// Restrict recognition to these characters. `None` lets the engine use its full set.
    #[serde(default = "default_char_whitelist")]
    pub char_whitelist: Option<String>,
    #[serde(default)]
    pub local: LocalEngineConfig,
    #[serde(default)]
    pub cloud: CloudEngineConfig,
}

impl RecognitionConfig {
    pub fn initial_timeout(&self) -> Duration {
        Duration::from_secs(self.initial_timeout_secs)
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_secs(self.retry_timeout_secs)
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            backend: RecognitionBackendKind::default(),
            initial_timeout_secs: default_initial_timeout_secs(),
            retry_timeout_secs: default_retry_timeout_secs(),
            char_whitelist: default_char_whitelist(),
            local: LocalEngineConfig::default(),
            cloud: CloudEngineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEngineConfig {
    /// Tesseract executable, resolved through PATH when not absolute
    pub binary: String,
    pub language: String,
    /// OCR engine mode (3 = default, LSTM when available)
    pub oem: u8,
    /// Page segmentation mode (12 = sparse text with orientation detection)
    pub psm: u8,
    #[serde(default = "default_true")]
    pub preserve_interword_spaces: bool,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: "eng".to_string(),
            oem: 3,
            psm: 12,
            preserve_interword_spaces: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudEngineConfig {
    /// e.g. `https://<resource>.cognitiveservices.azure.com`
    pub endpoint: String,
    /// Environment variable holding the subscription key
    pub api_key_env: String,
    pub model_id: String,
    pub api_version: String,
    pub poll_interval_ms: u64,
}

impl Default for CloudEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key_env: "AZURE_DOCUMENT_INTELLIGENCE_KEY".to_string(),
            model_id: "prebuilt-read".to_string(),
            api_version: "2024-11-30".to_string(),
            poll_interval_ms: 1000,
        }
    }
}

// ===== IMAGE NORMALIZER =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub scale_factor: u32,
    /// Gaussian blur kernel width (odd)
    pub blur_kernel: u32,
    /// Adaptive threshold neighbourhood width (odd)
    pub threshold_block_size: u32,
    /// Constant subtracted from the weighted neighbourhood mean
    pub threshold_offset: f32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            scale_factor: 2,
            blur_kernel: 3,
            threshold_block_size: 37,
            threshold_offset: 1.0,
        }
    }
}

// ===== LAYOUT =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Max vertical distance between a word's center and its line anchor
    pub y_tolerance: f32,
    /// Gap either side of the median x1 separating key and value regions
    pub x_tolerance: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            y_tolerance: 10.0,
            x_tolerance: 50.0,
        }
    }
}

// ===== SEGMENTATION =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Cosine distance above which clusters stop merging
    pub distance_threshold: f32,
    pub relax_pages: usize,
    /// Directory holding `model.onnx` and `tokenizer.json`
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
    pub max_sequence_length: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 0.65,
            relax_pages: 1,
            model_dir: None,
            max_sequence_length: 256,
        }
    }
}

// ===== FORMATS =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub chars_per_page: usize,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self { chars_per_page: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Root under which each container message gets its own folder
    pub attachments_dir: PathBuf,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            attachments_dir: PathBuf::from("msg_attachments"),
        }
    }
}

// ===== STORAGE =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "cache".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub max_chars: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self { max_chars: 500 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = ExtractionConfig::default();
        assert_eq!(config.recognition.initial_timeout(), Duration::from_secs(30));
        assert_eq!(config.recognition.retry_timeout(), Duration::from_secs(60));
        assert_eq!(config.recognition.local.psm, 12);
        assert_eq!(config.normalizer.threshold_block_size, 37);
        assert_eq!(config.layout.y_tolerance, 10.0);
        assert_eq!(config.layout.x_tolerance, 50.0);
        assert_eq!(config.segmentation.distance_threshold, 0.65);
        assert_eq!(config.segmentation.relax_pages, 1);
        assert_eq!(config.email.chars_per_page, 1000);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
recognition:
  backend: cloud
  char_whitelist: null
  cloud:
    endpoint: https://example.cognitiveservices.azure.com
    api_key_env: DI_KEY
    model_id: prebuilt-read
    api_version: "2024-11-30"
    poll_interval_ms: 250
segmentation:
  distance_threshold: 0.5
  relax_pages: 2
  max_sequence_length: 128
"#;
        let config: ExtractionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.recognition.backend, RecognitionBackendKind::Cloud);
        assert!(config.recognition.char_whitelist.is_none());
        assert_eq!(config.recognition.initial_timeout_secs, 30);
        assert_eq!(config.recognition.cloud.poll_interval_ms, 250);
        assert_eq!(config.segmentation.relax_pages, 2);
        assert_eq!(config.layout.x_tolerance, 50.0);
        assert_eq!(config.staging.attachments_dir, PathBuf::from("msg_attachments"));
    }

    #[test]
    fn test_load_with_fallback_on_missing_file() {
        let config = ExtractionConfig::load_with_fallback(Some("/nonexistent/claimtext.yaml"));
        assert_eq!(config.normalizer.scale_factor, 2);
    }
}
