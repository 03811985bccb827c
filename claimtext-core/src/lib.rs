// Claimtext Core Library
//
// Recovers text from claims documents: OCR preprocessing, layout-aware
// key/value extraction and semantic re-segmentation of multi-page scans.
// Main interface is DocumentProcessor::extract / DocumentProcessor::ingest.

pub mod types;
pub mod error;
pub mod config;
pub mod imaging;
pub mod recognition;
pub mod layout;
pub mod extractor;
pub mod segmentation;
pub mod formats;
pub mod processor;
pub mod cache;
pub mod classifier;
pub mod storage;

// Re-export main types and functions for easy use
pub use types::*;
pub use error::{ExtractionError, RecognitionError};
pub use config::ExtractionConfig;
pub use processor::DocumentProcessor;
pub use classifier::{DocumentClassifier, KeywordClassifier};
pub use storage::{DocumentStorage, FileStorage, NoOpStorage};
pub use recognition::{RecognitionBackend, RecognitionEngine};
pub use segmentation::{Embedder, Segmenter};

// Re-export the local embedder for direct use
#[cfg(feature = "onnx-embedder")]
pub use segmentation::OnnxEmbedder;
