use crate::cache::{ExtractionCacheKey, ExtractionCacheValue};
use crate::types::DocumentRecord;
use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Persistence boundary: the extraction cache plus one record per ingested document
pub trait DocumentStorage {
    fn get_extraction(&self, cache_key: &ExtractionCacheKey) -> Result<Option<ExtractionCacheValue>>;
    fn store_extraction(&self, cache_key: &ExtractionCacheKey, cache_value: &ExtractionCacheValue) -> Result<()>;

    fn record_document(&self, record: &DocumentRecord) -> Result<()>;
}

/// File-based storage under a local cache directory
pub struct FileStorage {
    cache_dir: PathBuf,
}

impl FileStorage {
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(cache_dir.join("extractions"))?;
        fs::create_dir_all(cache_dir.join("records"))?;

        Ok(Self { cache_dir })
    }

    fn extraction_path(&self, cache_key: &ExtractionCacheKey) -> PathBuf {
        self.cache_dir
            .join("extractions")
            .join(format!("{}.json", cache_key.to_cache_hash()))
    }

    fn record_path(&self, record: &DocumentRecord) -> PathBuf {
        self.cache_dir.join("records").join(format!("{}.json", record.id))
    }
}

impl DocumentStorage for FileStorage {
    fn get_extraction(&self, cache_key: &ExtractionCacheKey) -> Result<Option<ExtractionCacheValue>> {
        let path = self.extraction_path(cache_key);
        if path.exists() {
            let json_str = fs::read_to_string(path)?;
            let cache_value: ExtractionCacheValue = serde_json::from_str(&json_str)
                .map_err(|e| anyhow!("Failed to deserialize cached extraction: {}", e))?;
            Ok(Some(cache_value))
        } else {
            Ok(None)
        }
    }

    fn store_extraction(&self, cache_key: &ExtractionCacheKey, cache_value: &ExtractionCacheValue) -> Result<()> {
        let path = self.extraction_path(cache_key);
        let json_str = serde_json::to_string_pretty(cache_value)
            .map_err(|e| anyhow!("Failed to serialize extraction: {}", e))?;
        fs::write(path, json_str)?;
        Ok(())
    }

    fn record_document(&self, record: &DocumentRecord) -> Result<()> {
        let path = self.record_path(record);
        let json_str = serde_json::to_string_pretty(record)
            .map_err(|e| anyhow!("Failed to serialize document record: {}", e))?;
        fs::write(&path, json_str)?;
        tracing::debug!(path = %path.display(), "stored document record");
        Ok(())
    }
}

/// SHA-256 over the full file contents, streamed
pub fn calculate_file_hash(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Calculate hash for configuration data (for the extraction cache key)
pub fn calculate_config_hash<T: serde::Serialize>(config: &T) -> Result<String> {
    let config_json = serde_json::to_string(config)
        .map_err(|e| anyhow!("Failed to serialize config for hashing: {}", e))?;

    let mut hasher = Sha256::new();
    hasher.update(config_json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Storage that never hits and drops every record
pub struct NoOpStorage;

impl Default for NoOpStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl NoOpStorage {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentStorage for NoOpStorage {
    fn get_extraction(&self, _cache_key: &ExtractionCacheKey) -> Result<Option<ExtractionCacheValue>> {
        Ok(None) // Always cache miss
    }

    fn store_extraction(&self, _cache_key: &ExtractionCacheKey, _cache_value: &ExtractionCacheValue) -> Result<()> {
        Ok(())
    }

    fn record_document(&self, _record: &DocumentRecord) -> Result<()> {
        Ok(())
    }
}
