//! Model Manager - Auto-download and manage the page embedding model
//!
//! Downloads all-MiniLM-L6-v2 (ONNX export + tokenizer) from Hugging Face on
//! first use. Stores it in the user's data directory for reuse across invocations.

use anyhow::{anyhow, Context, Result};
use claimtext_core::segmentation::embedder::{MODEL_FILE, TOKENIZER_FILE};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Embedding model to download
const MODEL_NAME: &str = "all-MiniLM-L6-v2";
const MODEL_REPO: &str = "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main";

/// Manages the embedding model installation for the CLI
pub struct ModelManager {
    /// Base directory for claimtext data (e.g., ~/.local/share/claimtext)
    data_dir: PathBuf,
}

impl ModelManager {
    /// Create a new ModelManager using the default data directory
    pub fn new() -> Result<Self> {
        let data_dir = Self::get_data_dir()?;
        Ok(Self { data_dir })
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Get the data directory (~/.local/share/claimtext on all Unix platforms)
    fn get_data_dir() -> Result<PathBuf> {
        #[cfg(windows)]
        {
            let base = dirs::data_local_dir()
                .ok_or_else(|| anyhow!("Could not determine local data directory"))?;
            Ok(base.join("claimtext"))
        }

        #[cfg(not(windows))]
        {
            // ~/.local/share on macOS too, rather than ~/Library/Application Support
            let home = dirs::home_dir()
                .ok_or_else(|| anyhow!("Could not determine home directory"))?;
            Ok(home.join(".local").join("share").join("claimtext"))
        }
    }

    /// Get the directory where the model files live
    pub fn model_dir(&self) -> PathBuf {
        self.data_dir.join("models").join(MODEL_NAME)
    }

    /// Both the ONNX graph and the tokenizer must be present
    pub fn is_model_installed(&self) -> bool {
        let dir = self.model_dir();
        dir.join(MODEL_FILE).is_file() && dir.join(TOKENIZER_FILE).is_file()
    }

    /// Ensure the model is available, downloading if necessary.
    /// Returns the model directory.
    pub fn ensure_model(&self) -> Result<PathBuf> {
        let model_dir = self.model_dir();

        if self.is_model_installed() {
            println!("✅ Embedding model found at: {}", model_dir.display());
            return Ok(model_dir);
        }

        println!("📦 Embedding model not found, downloading {}...", MODEL_NAME);
        fs::create_dir_all(&model_dir).with_context(|| {
            format!("Failed to create model directory: {}", model_dir.display())
        })?;

        for (remote, local) in Self::files() {
            let dest = model_dir.join(local);
            if dest.is_file() {
                continue;
            }
            let url = format!("{MODEL_REPO}/{remote}");
            println!("   URL: {}", url);

            // Download next to the destination, then move into place
            let temp_path = model_dir.join(format!("{local}.tmp"));
            self.download_file(&url, &temp_path)?;
            fs::rename(&temp_path, &dest)
                .with_context(|| format!("Failed to move {} into place", dest.display()))?;
        }

        if self.is_model_installed() {
            println!("✅ Embedding model installed at: {}", model_dir.display());
            Ok(model_dir)
        } else {
            Err(anyhow!(
                "Model installation failed - {} or {} missing after download",
                MODEL_FILE,
                TOKENIZER_FILE
            ))
        }
    }

    /// (path under the repository, local file name)
    fn files() -> [(&'static str, &'static str); 2] {
        [("onnx/model.onnx", MODEL_FILE), ("tokenizer.json", TOKENIZER_FILE)]
    }

    /// Download a file with progress indication
    fn download_file(&self, url: &str, dest: &Path) -> Result<()> {
        let response = ureq::get(url)
            .call()
            .with_context(|| format!("Failed to download from {}", url))?;

        let total_size = response
            .header("Content-Length")
            .and_then(|s| s.parse::<u64>().ok());

        let mut reader = response.into_reader();
        let mut file = File::create(dest)
            .with_context(|| format!("Failed to create file: {}", dest.display()))?;

        let mut downloaded: u64 = 0;
        let mut buffer = [0u8; 8192];
        let mut last_progress = 0;

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            file.write_all(&buffer[..bytes_read])?;
            downloaded += bytes_read as u64;

            // Print progress every 10%
            if let Some(total) = total_size.filter(|t| *t > 0) {
                let progress = ((downloaded * 100) / total) as usize;
                if progress >= last_progress + 10 {
                    print!(
                        "\r   Downloading: {}% ({:.1} MB)",
                        progress,
                        downloaded as f64 / 1_000_000.0
                    );
                    io::stdout().flush()?;
                    last_progress = progress;
                }
            }
        }

        if total_size.is_some() {
            println!("\r   Downloading: 100%                    ");
        }
        tracing::debug!(url, bytes = downloaded, "download finished");

        Ok(())
    }
}
