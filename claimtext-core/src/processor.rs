use crate::cache::{ExtractionCacheKey, ExtractionCacheValue};
use crate::classifier::DocumentClassifier;
use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::extractor::{PageExtractor, PageOutcome};
use crate::formats::{self, ContainerMessage, FormatKind};
use crate::imaging;
use crate::recognition::RecognitionEngine;
use crate::segmentation::{Embedder, Segmenter};
use crate::storage::{calculate_config_hash, calculate_file_hash, DocumentStorage};
use crate::types::*;
use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Simple profiler that collects timings for pipeline steps
pub struct StepProfiler {
    enabled: bool,
    timings: Vec<(String, Duration)>,
}

impl StepProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub fn time_step<F, R>(&mut self, step_name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        self.timings.push((step_name.to_string(), elapsed));
        println!("⏱️  {}: {:.0}ms", step_name, elapsed.as_millis());

        result
    }

    pub fn print_summary(&self) {
        if !self.enabled || self.timings.is_empty() {
            return;
        }

        println!("\n📊 Performance Summary:");
        let total: Duration = self.timings.iter().map(|(_, d)| *d).sum();

        for (step, duration) in &self.timings {
            let percentage = if total.is_zero() {
                0.0
            } else {
                (duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            };
            println!(
                "   {:.<35} {:.0}ms ({:.1}%)",
                step,
                duration.as_millis(),
                percentage
            );
        }
        println!("   {:.<35} {:.0}ms", "Total", total.as_millis());
    }
}

/// Identity of a file for the ancestor guard: same canonical path or same bytes
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileIdentity {
    canonical: PathBuf,
    hash: String,
}

impl FileIdentity {
    fn of(path: &Path) -> Result<Self, ExtractionError> {
        let canonical = std::fs::canonicalize(path).map_err(|e| ExtractionError::filesystem(path, e))?;
        let hash = calculate_file_hash(&canonical).map_err(|e| ExtractionError::filesystem(path, e))?;
        Ok(Self { canonical, hash })
    }

    fn matches(&self, other: &FileIdentity) -> bool {
        self.canonical == other.canonical || self.hash == other.hash
    }
}

/// Output of one uncached extraction. `degraded` is set when any part fell back
/// to empty text after a recoverable failure; such results are never cached.
struct Extracted {
    result: ExtractionResult,
    degraded: bool,
}

impl From<ExtractionResult> for Extracted {
    fn from(result: ExtractionResult) -> Self {
        Self {
            result,
            degraded: false,
        }
    }
}

/// Format dispatcher.
///
/// `extract` turns one file into an [`ExtractionResult`] and has no side effects
/// beyond the extraction cache. `ingest` adds classification and persistence, and
/// for container messages stages the attachments and ingests each of them.
pub struct DocumentProcessor {
    config: ExtractionConfig,
    config_hash: String,
    extractor: PageExtractor,
    segmenter: Segmenter,
    classifier: Box<dyn DocumentClassifier>,
    storage: Box<dyn DocumentStorage + Send + Sync>,
    skip_cache: bool,
    profiler: StepProfiler,
}

impl DocumentProcessor {
    /// Create DocumentProcessor with full dependency injection
    pub fn new_with_dependencies(
        config: ExtractionConfig,
        engine: Box<dyn RecognitionEngine>,
        embedder: Box<dyn Embedder>,
        classifier: Box<dyn DocumentClassifier>,
        storage: Box<dyn DocumentStorage + Send + Sync>,
    ) -> Result<Self> {
        let config_hash = calculate_config_hash(&config)?;
        Ok(Self {
            extractor: PageExtractor::new(engine, &config),
            segmenter: Segmenter::new(embedder, config.segmentation.clone()),
            config,
            config_hash,
            classifier,
            storage,
            skip_cache: false,
            profiler: StepProfiler::new(false),
        })
    }

    /// Convenience constructor: configured recognition backend, local MiniLM,
    /// keyword classifier and file storage under `cache.dir`.
    #[cfg(feature = "onnx-embedder")]
    pub fn from_config(config: ExtractionConfig) -> Result<Self> {
        use crate::classifier::KeywordClassifier;
        use crate::recognition::RecognitionBackend;
        use crate::segmentation::OnnxEmbedder;
        use crate::storage::FileStorage;

        let model_dir = config
            .segmentation
            .model_dir
            .clone()
            .ok_or_else(|| anyhow::anyhow!("segmentation.model_dir is not set"))?;

        let engine = Box::new(RecognitionBackend::from_config(&config.recognition)?);
        let embedder = Box::new(OnnxEmbedder::load(
            &model_dir,
            config.segmentation.max_sequence_length,
        )?);
        let classifier = Box::new(KeywordClassifier::new(config.summary.clone()));
        let storage = Box::new(FileStorage::new(&config.cache.dir)?);
        Self::new_with_dependencies(config, engine, embedder, classifier, storage)
    }

    pub fn set_skip_cache(&mut self, skip_cache: bool) {
        self.skip_cache = skip_cache;
    }

    pub fn set_profiling(&mut self, enabled: bool) {
        self.profiler = StepProfiler::new(enabled);
    }

    pub fn print_profile(&self) {
        self.profiler.print_summary();
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract the text of one file.
    ///
    /// Only a missing/unreadable input or a storage failure is returned as an
    /// error. Unsupported extensions and undecodable files log and yield an
    /// empty result. Container messages yield their body; attachments are only
    /// handled by [`DocumentProcessor::ingest`].
    pub fn extract(&mut self, path: &Path) -> Result<ExtractionResult, ExtractionError> {
        let identity = FileIdentity::of(path)?;
        self.extract_identified(path, &identity)
    }

    /// Extract, classify and persist one file. Container messages also stage
    /// and ingest their attachments before the message itself is recorded.
    pub fn ingest(&mut self, path: &Path, source: &str) -> Result<DocumentRecord, ExtractionError> {
        let identity = FileIdentity::of(path)?;
        let mut ancestors = Vec::new();
        self.ingest_guarded(path, identity, source, &mut ancestors)
    }

    fn ingest_guarded(
        &mut self,
        path: &Path,
        identity: FileIdentity,
        source: &str,
        ancestors: &mut Vec<FileIdentity>,
    ) -> Result<DocumentRecord, ExtractionError> {
        ancestors.push(identity.clone());
        let outcome = self.ingest_node(path, &identity, source, ancestors);
        ancestors.pop();
        outcome
    }

    fn ingest_node(
        &mut self,
        path: &Path,
        identity: &FileIdentity,
        source: &str,
        ancestors: &mut Vec<FileIdentity>,
    ) -> Result<DocumentRecord, ExtractionError> {
        let start_time = Instant::now();
        tracing::info!(path = %path.display(), source, "ingesting document");

        let result = if FormatKind::from_path(path).is_container() {
            match ContainerMessage::from_path(path) {
                Ok(message) => {
                    self.ingest_attachments(path, &message, source, ancestors)?;
                    ExtractionResult::Text(message.body)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable container message");
                    ExtractionResult::empty()
                }
            }
        } else {
            self.extract_identified(path, identity)?
        };

        let text = result.to_classifier_text();
        let classifier = &self.classifier;
        let classification = self
            .profiler
            .time_step("Classification", || classifier.classify(&text))
            .unwrap_or_else(|e| {
                tracing::error!(path = %path.display(), error = %e, "classification failed");
                Classification::failed()
            });

        let document_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let record = DocumentRecord::new(
            document_name,
            source,
            classification,
            start_time.elapsed().as_millis() as u64,
            identity.canonical.display().to_string(),
            Utc::now(),
        );
        self.storage.record_document(&record)?;

        tracing::info!(
            path = %path.display(),
            doc_type = %record.doc_type_predicted,
            elapsed_ms = record.processing_time_ms,
            "document recorded"
        );
        Ok(record)
    }

    /// Stage every attachment of `message` and ingest the staged files in order.
    ///
    /// Staging failures are fatal. A failing attachment is logged and its
    /// siblings still run; files identical to an in-progress ancestor are skipped.
    fn ingest_attachments(
        &mut self,
        message_path: &Path,
        message: &ContainerMessage,
        source: &str,
        ancestors: &mut Vec<FileIdentity>,
    ) -> Result<Vec<DocumentRecord>, ExtractionError> {
        let report = formats::outlook::stage_attachments(
            message_path,
            message,
            &self.config.staging.attachments_dir,
        )?;
        tracing::info!(
            path = %message_path.display(),
            saved = report.saved,
            skipped_existing = report.skipped_existing,
            skipped_unnamed = report.skipped_unnamed,
            "staged container attachments"
        );

        let mut records = Vec::new();
        for staged in &report.staged {
            let identity = match FileIdentity::of(staged) {
                Ok(identity) => identity,
                Err(e) => {
                    tracing::error!(path = %staged.display(), error = %e, "cannot read staged attachment");
                    continue;
                }
            };
            if ancestors.iter().any(|a| a.matches(&identity)) {
                tracing::warn!(path = %staged.display(), "attachment is already being processed by an ancestor, skipping");
                continue;
            }

            match self.ingest_guarded(staged, identity, source, ancestors) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::error!(path = %staged.display(), error = %e, "attachment ingestion failed")
                }
            }
        }
        Ok(records)
    }

    fn extract_identified(
        &mut self,
        path: &Path,
        identity: &FileIdentity,
    ) -> Result<ExtractionResult, ExtractionError> {
        let start_time = Instant::now();
        let kind = FormatKind::from_path(path);
        let use_cache = self.config.cache.enabled && !self.skip_cache && !kind.is_container();

        let cache_key = ExtractionCacheKey::new(identity.hash.clone(), self.config_hash.clone());
        if use_cache {
            let storage = &self.storage;
            if let Some(cached) = self
                .profiler
                .time_step("Cache Lookup", || storage.get_extraction(&cache_key))?
            {
                tracing::info!(path = %path.display(), "🎯 cache hit");
                return Ok(cached.result);
            }
        }

        let Extracted { result, degraded } = match self.extract_uncached(path, &kind) {
            Ok(extracted) => extracted,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "extraction failed, using empty text");
                return Ok(ExtractionResult::empty());
            }
        };

        if use_cache && degraded {
            tracing::warn!(path = %path.display(), "recognition degraded, result not cached");
        } else if use_cache {
            let processing_time = start_time.elapsed().as_millis() as u64;
            let cache_value = ExtractionCacheValue::new(result.clone(), processing_time);
            let storage = &self.storage;
            self.profiler
                .time_step("Cache Storage", || storage.store_extraction(&cache_key, &cache_value))?;
        }

        tracing::debug!(
            path = %path.display(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "extraction finished"
        );
        Ok(result)
    }

    fn extract_uncached(&mut self, path: &Path, kind: &FormatKind) -> Result<Extracted, ExtractionError> {
        let result = match kind {
            FormatKind::Image => return self.extract_image(path),
            FormatKind::Spreadsheet => ExtractionResult::Table(formats::spreadsheet::extract_sheets(path)?),
            FormatKind::OfficeDocument => ExtractionResult::Text(formats::office::extract_docx_text(path)?),
            FormatKind::Pdf => ExtractionResult::Text(formats::pdf::extract_pdf_text(path)?),
            FormatKind::Email => ExtractionResult::Text(formats::email::extract_email_text(
                path,
                self.config.email.chars_per_page,
            )?),
            FormatKind::ContainerMessage => ExtractionResult::Text(ContainerMessage::from_path(path)?.body),
            FormatKind::Unsupported(extension) => {
                return Err(ExtractionError::UnsupportedFormat(extension.clone()))
            }
        };
        Ok(result.into())
    }

    /// Decompose → recognize page by page → segment
    fn extract_image(&mut self, path: &Path) -> Result<Extracted, ExtractionError> {
        let pages = self
            .profiler
            .time_step("1. Page Decomposition", || imaging::load_pages(path))?;
        tracing::info!(
            path = %path.display(),
            pages = pages.len(),
            engine = self.extractor.engine_name(),
            "recognizing pages"
        );

        let extractor = &self.extractor;
        let outcomes = self
            .profiler
            .time_step("2. Page Recognition", || extractor.extract_pages(&pages));
        drop(pages);

        let degraded = outcomes.iter().filter(|o| o.is_degraded()).count();
        if degraded > 0 {
            tracing::warn!(path = %path.display(), degraded, "pages left empty after recognition failures");
        }
        let page_texts: Vec<PageText> = outcomes.into_iter().map(PageOutcome::into_text).collect();

        let segmenter = &mut self.segmenter;
        let clusters = self
            .profiler
            .time_step("3. Segmentation", || segmenter.segment(&page_texts));
        tracing::info!(path = %path.display(), clusters = clusters.len(), "segmented pages");

        Ok(Extracted {
            result: ExtractionResult::Clusters(clusters),
            degraded: degraded > 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognitionError;
    use crate::formats::ContainerAttachment;
    use crate::recognition::PositionalText;
    use crate::storage::NoOpStorage;
    use image::{GrayImage, Luma};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    struct BlindEngine;

    impl RecognitionEngine for BlindEngine {
        fn extract_plain_text(&self, _image: &GrayImage, timeout: Duration) -> Result<String, RecognitionError> {
            Err(RecognitionError::Timeout(timeout))
        }

        fn extract_positional_text(
            &self,
            _image: &GrayImage,
            timeout: Duration,
        ) -> Result<PositionalText, RecognitionError> {
            Err(RecognitionError::Timeout(timeout))
        }

        fn name(&self) -> &str {
            "blind"
        }
    }

    /// Times out until switched on, then reads a single word
    struct SwitchableEngine {
        up: Arc<AtomicBool>,
    }

    impl RecognitionEngine for SwitchableEngine {
        fn extract_plain_text(&self, _image: &GrayImage, timeout: Duration) -> Result<String, RecognitionError> {
            if self.up.load(Ordering::SeqCst) {
                Ok("Estimate".to_string())
            } else {
                Err(RecognitionError::Timeout(timeout))
            }
        }

        fn extract_positional_text(
            &self,
            _image: &GrayImage,
            timeout: Duration,
        ) -> Result<PositionalText, RecognitionError> {
            if self.up.load(Ordering::SeqCst) {
                Ok(PositionalText::Words(vec![RecognizedWord::new(
                    "Estimate",
                    BoundingBox::new(0.0, 0.0, 60.0, 12.0),
                )]))
            } else {
                Err(RecognitionError::Timeout(timeout))
            }
        }

        fn name(&self) -> &str {
            "switchable"
        }
    }

    struct FlatEmbedder;

    impl Embedder for FlatEmbedder {
        fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn name(&self) -> &str {
            "flat"
        }
    }

    struct FixedClassifier;

    impl DocumentClassifier for FixedClassifier {
        fn classify(&self, text: &str) -> Result<Classification> {
            Ok(Classification {
                doc_type: "Other Reports".to_string(),
                summary: text.chars().take(20).collect(),
            })
        }
    }

    #[derive(Clone, Default)]
    struct RecordingStorage {
        records: Arc<Mutex<Vec<DocumentRecord>>>,
    }

    impl DocumentStorage for RecordingStorage {
        fn get_extraction(&self, _key: &ExtractionCacheKey) -> Result<Option<ExtractionCacheValue>> {
            Ok(None)
        }

        fn store_extraction(&self, _key: &ExtractionCacheKey, _value: &ExtractionCacheValue) -> Result<()> {
            Ok(())
        }

        fn record_document(&self, record: &DocumentRecord) -> Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    /// Refuses to record one document name, records everything else
    #[derive(Clone)]
    struct RejectingStorage {
        reject: &'static str,
        records: Arc<Mutex<Vec<DocumentRecord>>>,
    }

    impl DocumentStorage for RejectingStorage {
        fn get_extraction(&self, _key: &ExtractionCacheKey) -> Result<Option<ExtractionCacheValue>> {
            Ok(None)
        }

        fn store_extraction(&self, _key: &ExtractionCacheKey, _value: &ExtractionCacheValue) -> Result<()> {
            Ok(())
        }

        fn record_document(&self, record: &DocumentRecord) -> Result<()> {
            if record.document_name == self.reject {
                anyhow::bail!("no space left for {}", record.document_name);
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn processor(staging: &Path, storage: Box<dyn DocumentStorage + Send + Sync>) -> DocumentProcessor {
        processor_with_engine(staging, Box::new(BlindEngine), storage)
    }

    fn processor_with_engine(
        staging: &Path,
        engine: Box<dyn RecognitionEngine>,
        storage: Box<dyn DocumentStorage + Send + Sync>,
    ) -> DocumentProcessor {
        let mut config = ExtractionConfig::default();
        config.staging.attachments_dir = staging.to_path_buf();
        DocumentProcessor::new_with_dependencies(
            config,
            engine,
            Box::new(FlatEmbedder),
            Box::new(FixedClassifier),
            storage,
        )
        .unwrap()
    }

    const EML: &str = "From: a@example.com\r\nSubject: note\r\n\r\nAdjuster note body.\r\n";

    #[test]
    fn test_unsupported_extension_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        std::fs::write(&path, b"PK\x03\x04").unwrap();

        let mut processor = processor(dir.path(), Box::new(NoOpStorage::new()));
        let result = processor.extract(&path).unwrap();
        assert_eq!(result, ExtractionResult::Text(String::new()));
    }

    #[test]
    fn test_missing_file_is_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut processor = processor(dir.path(), Box::new(NoOpStorage::new()));
        let err = processor.extract(&dir.path().join("nope.pdf")).unwrap_err();
        assert!(matches!(err, ExtractionError::Filesystem { .. }));
        assert!(processor.ingest(&dir.path().join("nope.pdf"), "cli").is_err());
    }

    #[test]
    fn test_ingest_records_text_native_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.eml");
        std::fs::write(&path, EML).unwrap();

        let storage = RecordingStorage::default();
        let mut processor = processor(dir.path(), Box::new(storage.clone()));
        let record = processor.ingest(&path, "upload").unwrap();

        assert_eq!(record.document_name, "note.eml");
        assert_eq!(record.source, "upload");
        assert!(record.summary.starts_with("Adjuster note body."));
        assert!(Path::new(&record.file_url).is_absolute());
        assert_eq!(storage.records.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_container_attachments_each_ingested_once() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        let message_path = dir.path().join("claim.msg");
        std::fs::write(&message_path, b"outer message bytes").unwrap();

        // second attachment is already on disk under its computed name
        std::fs::create_dir_all(staging.join("claim")).unwrap();
        std::fs::write(staging.join("claim").join("claimscan.pdf"), b"not really a pdf").unwrap();

        let message = ContainerMessage {
            body: "see attachments".to_string(),
            attachments: vec![
                ContainerAttachment { filename: Some("note.eml".into()), data: EML.as_bytes().to_vec() },
                ContainerAttachment { filename: Some("scan.pdf".into()), data: b"different".to_vec() },
            ],
        };

        let storage = RecordingStorage::default();
        let mut processor = processor(&staging, Box::new(storage.clone()));
        let mut ancestors = vec![FileIdentity::of(&message_path).unwrap()];
        let records = processor
            .ingest_attachments(&message_path, &message, "email", &mut ancestors)
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.source == "email"));
        assert_eq!(records[0].document_name, "claimnote.eml");
        assert_eq!(records[1].document_name, "claimscan.pdf");
        // pre-staged file kept its original bytes
        assert_eq!(
            std::fs::read(staging.join("claim").join("claimscan.pdf")).unwrap(),
            b"not really a pdf"
        );
        assert_eq!(storage.records.lock().unwrap().len(), 2);
        assert_eq!(ancestors.len(), 1);
    }

    #[test]
    fn test_attachment_identical_to_ancestor_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        let message_path = dir.path().join("loop.msg");
        std::fs::write(&message_path, b"self-referencing bytes").unwrap();

        let message = ContainerMessage {
            body: String::new(),
            attachments: vec![ContainerAttachment {
                filename: Some("again.msg".into()),
                data: b"self-referencing bytes".to_vec(),
            }],
        };

        let storage = RecordingStorage::default();
        let mut processor = processor(&staging, Box::new(storage.clone()));
        let mut ancestors = vec![FileIdentity::of(&message_path).unwrap()];
        let records = processor
            .ingest_attachments(&message_path, &message, "email", &mut ancestors)
            .unwrap();

        assert!(records.is_empty());
        assert!(storage.records.lock().unwrap().is_empty());
        // still staged, only the recursion is suppressed
        assert!(staging.join("loop").join("loopagain.msg").exists());
    }

    #[test]
    fn test_unreadable_container_still_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.msg");
        std::fs::write(&path, b"not an OLE file").unwrap();

        let storage = RecordingStorage::default();
        let mut processor = processor(&dir.path().join("staging"), Box::new(storage.clone()));
        let record = processor.ingest(&path, "cli").unwrap();
        assert_eq!(record.summary, "");
        assert_eq!(storage.records.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_extraction_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.eml");
        std::fs::write(&path, EML).unwrap();
        let storage = crate::storage::FileStorage::new(dir.path().join("cache")).unwrap();

        let mut processor = processor(dir.path(), Box::new(storage));
        let first = processor.extract(&path).unwrap();
        let entries = std::fs::read_dir(dir.path().join("cache").join("extractions")).unwrap().count();
        assert_eq!(entries, 1);
        assert_eq!(processor.extract(&path).unwrap(), first);
    }

    #[test]
    fn test_failing_attachment_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        let message_path = dir.path().join("claim.msg");
        std::fs::write(&message_path, b"outer message bytes").unwrap();

        let message = ContainerMessage {
            body: String::new(),
            attachments: vec![
                ContainerAttachment {
                    filename: Some("first.eml".into()),
                    data: b"Subject: one\r\n\r\nFirst body.\r\n".to_vec(),
                },
                ContainerAttachment { filename: Some("second.eml".into()), data: EML.as_bytes().to_vec() },
            ],
        };

        let storage = RejectingStorage {
            reject: "claimfirst.eml",
            records: Arc::new(Mutex::new(Vec::new())),
        };
        let mut processor = processor(&staging, Box::new(storage.clone()));
        let mut ancestors = vec![FileIdentity::of(&message_path).unwrap()];
        let records = processor
            .ingest_attachments(&message_path, &message, "email", &mut ancestors)
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].document_name, "claimsecond.eml");
        let stored = storage.records.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].document_name, "claimsecond.eml");
        assert_eq!(ancestors.len(), 1);
    }

    #[test]
    fn test_degraded_recognition_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        GrayImage::from_pixel(24, 16, Luma([255u8])).save(&path).unwrap();
        let cache_dir = dir.path().join("cache");
        let storage = crate::storage::FileStorage::new(&cache_dir).unwrap();
        let cached_entries = || std::fs::read_dir(cache_dir.join("extractions")).unwrap().count();

        let up = Arc::new(AtomicBool::new(false));
        let engine = SwitchableEngine { up: up.clone() };
        let mut processor = processor_with_engine(dir.path(), Box::new(engine), Box::new(storage));

        // engine down: empty page, nothing cached
        let first = processor.extract(&path).unwrap();
        assert_eq!(first.cluster_texts(), vec![""]);
        assert_eq!(cached_entries(), 0);

        // engine back: fresh recognition, now cached
        up.store(true, Ordering::SeqCst);
        let second = processor.extract(&path).unwrap();
        assert_eq!(second.cluster_texts(), vec!["Estimate\n"]);
        assert_eq!(cached_entries(), 1);

        // engine down again: served from cache
        up.store(false, Ordering::SeqCst);
        assert_eq!(processor.extract(&path).unwrap(), second);
    }
}
