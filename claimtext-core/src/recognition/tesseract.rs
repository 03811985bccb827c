//! Local recognition through the Tesseract command line
//!
//! Each call writes the page to a scratch directory and runs
//! `tesseract page.png out -l eng --oem 3 --psm 12 [-c ...] [hocr]`.
//! The child is killed once the timeout budget is spent.

use super::{PositionalText, RecognitionEngine};
use crate::config::LocalEngineConfig;
use crate::error::RecognitionError;
use image::GrayImage;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct TesseractEngine {
    config: LocalEngineConfig,
    char_whitelist: Option<String>,
}

impl TesseractEngine {
    pub fn new(config: LocalEngineConfig, char_whitelist: Option<String>) -> Self {
        Self {
            config,
            char_whitelist,
        }
    }

    /// Arguments following the input image and output base
    fn build_args(&self, hocr: bool) -> Vec<String> {
        let mut args = vec![
            "-l".to_string(),
            self.config.language.clone(),
            "--oem".to_string(),
            self.config.oem.to_string(),
            "--psm".to_string(),
            self.config.psm.to_string(),
        ];
        if let Some(whitelist) = &self.char_whitelist {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={whitelist}"));
        }
        if self.config.preserve_interword_spaces {
            args.push("-c".to_string());
            args.push("preserve_interword_spaces=1".to_string());
        }
        if hocr {
            args.push("hocr".to_string());
        }
        args
    }

    /// Run tesseract and return the contents of the file it produced
    fn run(&self, image: &GrayImage, timeout: Duration, hocr: bool) -> Result<String, RecognitionError> {
        let scratch = tempfile::Builder::new().prefix("claimtext-ocr").tempdir()?;
        let input = scratch.path().join("page.png");
        image.save_with_format(&input, image::ImageFormat::Png)?;
        let output_base = scratch.path().join("out");

        let mut child = Command::new(&self.config.binary)
            .arg(&input)
            .arg(&output_base)
            .args(self.build_args(hocr))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RecognitionError::Engine(format!("failed to start {}: {e}", self.config.binary)))?;

        // stderr is read on its own thread while the child runs
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut captured = String::new();
                let _ = pipe.read_to_string(&mut captured);
                captured
            })
        });

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RecognitionError::Timeout(timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let stderr = stderr_reader
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(RecognitionError::Engine(format!(
                "tesseract exited with {status}: {}",
                stderr.trim()
            )));
        }

        let extension = if hocr { "hocr" } else { "txt" };
        read_output(&output_base.with_extension(extension))
    }
}

fn read_output(path: &Path) -> Result<String, RecognitionError> {
    std::fs::read_to_string(path).map_err(|e| {
        RecognitionError::Engine(format!("missing tesseract output {}: {e}", path.display()))
    })
}

impl RecognitionEngine for TesseractEngine {
    fn extract_plain_text(
        &self,
        image: &GrayImage,
        timeout: Duration,
    ) -> Result<String, RecognitionError> {
        self.run(image, timeout, false)
    }

    fn extract_positional_text(
        &self,
        image: &GrayImage,
        timeout: Duration,
    ) -> Result<PositionalText, RecognitionError> {
        self.run(image, timeout, true).map(PositionalText::Hocr)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}
