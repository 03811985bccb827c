//! Cloud recognition through Azure Document Intelligence
//!
//! The read model is asynchronous: the page is POSTed to
//! `{endpoint}/documentintelligence/documentModels/{model}:analyze`, and the
//! result is polled from the `Operation-Location` header until it settles.
//! Both the submit and every poll share one timeout budget.

use super::{encode_png, PositionalText, RecognitionEngine};
use crate::config::CloudEngineConfig;
use crate::error::RecognitionError;
use crate::types::{BoundingBox, RecognizedWord};
use anyhow::anyhow;
use image::GrayImage;
use serde::Deserialize;
use std::time::{Duration, Instant};

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

pub struct AzureReadEngine {
    config: CloudEngineConfig,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    pages: Vec<AnalyzedPage>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyzedPage {
    #[serde(default)]
    words: Vec<AnalyzedSpan>,
    #[serde(default)]
    lines: Vec<AnalyzedSpan>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedSpan {
    content: String,
    #[serde(default)]
    polygon: Vec<f32>,
}

impl AzureReadEngine {
    pub fn new(config: CloudEngineConfig, api_key: String) -> Self {
        Self { config, api_key }
    }

    /// Read the subscription key from the configured environment variable
    pub fn from_config(config: &CloudEngineConfig) -> anyhow::Result<Self> {
        if config.endpoint.is_empty() {
            return Err(anyhow!("cloud recognition requires recognition.cloud.endpoint"));
        }
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("environment variable {} is not set", config.api_key_env))?;
        Ok(Self::new(config.clone(), api_key))
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model_id,
            self.config.api_version
        )
    }

    fn analyze(&self, image: &GrayImage, timeout: Duration) -> Result<AnalyzeResult, RecognitionError> {
        let deadline = Instant::now() + timeout;
        let body = encode_png(image)?;

        let response = ureq::post(&self.analyze_url())
            .set(KEY_HEADER, &self.api_key)
            .set("Content-Type", "application/octet-stream")
            .timeout(remaining(deadline, timeout)?)
            .send_bytes(&body)
            .map_err(http_error)?;

        let operation_url = response
            .header("Operation-Location")
            .ok_or_else(|| RecognitionError::Http("response has no Operation-Location header".into()))?
            .to_string();

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        loop {
            let operation: AnalyzeOperation = ureq::get(&operation_url)
                .set(KEY_HEADER, &self.api_key)
                .timeout(remaining(deadline, timeout)?)
                .call()
                .map_err(http_error)?
                .into_json()
                .map_err(|e| RecognitionError::Http(format!("invalid analyze response: {e}")))?;

            match operation.status.as_str() {
                "succeeded" => return Ok(operation.analyze_result.unwrap_or_default()),
                "failed" | "canceled" => {
                    let detail = operation.error.map(|e| e.to_string()).unwrap_or_default();
                    return Err(RecognitionError::Engine(format!(
                        "analyze operation {}: {detail}",
                        operation.status
                    )));
                }
                _ => {
                    let wait = poll_interval.min(remaining(deadline, timeout)?);
                    std::thread::sleep(wait);
                }
            }
        }
    }
}

fn remaining(deadline: Instant, budget: Duration) -> Result<Duration, RecognitionError> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        Err(RecognitionError::Timeout(budget))
    } else {
        Ok(left)
    }
}

fn http_error(err: ureq::Error) -> RecognitionError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            RecognitionError::Http(format!("status {code}: {body}"))
        }
        ureq::Error::Transport(transport) => RecognitionError::Http(transport.to_string()),
    }
}

fn words_from_result(result: AnalyzeResult) -> Vec<RecognizedWord> {
    result
        .pages
        .into_iter()
        .flat_map(|page| page.words)
        .filter_map(|word| {
            let bbox = BoundingBox::from_polygon(&word.polygon)?;
            Some(RecognizedWord::new(word.content, bbox))
        })
        .collect()
}

fn text_from_result(result: &AnalyzeResult) -> String {
    result
        .pages
        .iter()
        .flat_map(|page| page.lines.iter())
        .map(|line| line.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

impl RecognitionEngine for AzureReadEngine {
    fn extract_plain_text(
        &self,
        image: &GrayImage,
        timeout: Duration,
    ) -> Result<String, RecognitionError> {
        let result = self.analyze(image, timeout)?;
        Ok(text_from_result(&result))
    }

    fn extract_positional_text(
        &self,
        image: &GrayImage,
        timeout: Duration,
    ) -> Result<PositionalText, RecognitionError> {
        let result = self.analyze(image, timeout)?;
        Ok(PositionalText::Words(words_from_result(result)))
    }

    fn name(&self) -> &str {
        "azure-read"
    }
}
