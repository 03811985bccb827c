use crate::types::ExtractionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version constants for cache invalidation
pub mod versions {
    pub const CLAIMTEXT_VERSION: &str = env!("CARGO_PKG_VERSION");
    /// Bump whenever extraction output changes for identical input and config
    pub const PROCESSING_VERSION: &str = "1.0.0";
}

/// Cache key for one extraction (file bytes + config → result)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ExtractionCacheKey {
    pub file_hash: String,
    pub config_hash: String,
    pub claimtext_version: String,
    pub processing_version: String,
}

impl ExtractionCacheKey {
    pub fn new(file_hash: String, config_hash: String) -> Self {
        Self {
            file_hash,
            config_hash,
            claimtext_version: versions::CLAIMTEXT_VERSION.to_string(),
            processing_version: versions::PROCESSING_VERSION.to_string(),
        }
    }

    /// Compute cache key hash for storage
    pub fn to_cache_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(&self.file_hash);
        hasher.update(&self.config_hash);
        hasher.update(&self.claimtext_version);
        hasher.update(&self.processing_version);
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionCacheValue {
    pub result: ExtractionResult,
    pub created_at: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub cache_version: String,
}

impl ExtractionCacheValue {
    pub fn new(result: ExtractionResult, processing_time_ms: u64) -> Self {
        Self {
            result,
            created_at: Utc::now(),
            processing_time_ms,
            cache_version: versions::CLAIMTEXT_VERSION.to_string(),
        }
    }
}
