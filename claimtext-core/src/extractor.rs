use crate::config::ExtractionConfig;
use crate::imaging::ImageNormalizer;
use crate::layout::LayoutParser;
use crate::recognition::RecognitionEngine;
use crate::types::{Page, PageText};
use image::GrayImage;
use std::time::Duration;

/// Normalizer → recognition → layout for one page, with timeout escalation.
///
/// Escalation order:
/// 1. positional recognition at the initial budget (30s)
/// 2. positional recognition at the retry budget (60s) if (1) failed or produced blank text
/// 3. plain recognition at the retry budget if (2) failed or produced blank text
///
/// Nothing here is fatal: a page that survives none of the attempts is empty
/// and reported as [`PageOutcome::Degraded`].
pub struct PageExtractor {
    engine: Box<dyn RecognitionEngine>,
    normalizer: ImageNormalizer,
    layout: LayoutParser,
    initial_timeout: Duration,
    retry_timeout: Duration,
}

impl PageExtractor {
    pub fn new(engine: Box<dyn RecognitionEngine>, config: &ExtractionConfig) -> Self {
        Self {
            engine,
            normalizer: ImageNormalizer::new(config.normalizer.clone()),
            layout: LayoutParser::new(config.layout.clone()),
            initial_timeout: config.recognition.initial_timeout(),
            retry_timeout: config.recognition.retry_timeout(),
        }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn extract_page(&self, page: &Page) -> PageOutcome {
        let normalized = match self.normalizer.normalize(&page.image) {
            Ok(image) => image,
            Err(e) => {
                tracing::error!(page = page.index, error = %e, "page normalization failed");
                return PageOutcome::Degraded(PageText::empty(page.index));
            }
        };

        let positional = self
            .positional_page(page.index, &normalized, self.initial_timeout)
            .or_else(|| {
                tracing::info!(
                    page = page.index,
                    timeout_secs = self.retry_timeout.as_secs(),
                    "retrying positional recognition with a larger budget"
                );
                self.positional_page(page.index, &normalized, self.retry_timeout)
            });
        if let Some(text) = positional {
            return PageOutcome::Recognized(text);
        }

        tracing::info!(page = page.index, "falling back to plain-text recognition");
        match self.engine.extract_plain_text(&normalized, self.retry_timeout) {
            Ok(text) => PageOutcome::Recognized(PageText::new(page.index, text)),
            Err(e) => {
                tracing::error!(page = page.index, error = %e, "plain-text recognition failed, page left empty");
                PageOutcome::Degraded(PageText::empty(page.index))
            }
        }
    }

    /// One positional attempt; `None` on error or blank text
    fn positional_page(&self, index: usize, image: &GrayImage, timeout: Duration) -> Option<PageText> {
        match self.engine.extract_positional_text(image, timeout) {
            Ok(positional) => {
                let text = self.layout.parse_page(index, positional.into_words());
                if text.is_blank() {
                    tracing::warn!(page = index, timeout_secs = timeout.as_secs(), "positional recognition produced no text");
                    None
                } else {
                    Some(text)
                }
            }
            Err(e) => {
                tracing::warn!(page = index, timeout_secs = timeout.as_secs(), error = %e, "positional recognition failed");
                None
            }
        }
    }

    pub fn extract_pages(&self, pages: &[Page]) -> Vec<PageOutcome> {
        pages.iter().map(|page| self.extract_page(page)).collect()
    }
}

/// Text of one page and whether recognition gave up on it
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Recognized(PageText),
    /// Every attempt failed; the text is empty and must not be cached
    Degraded(PageText),
}

impl PageOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, PageOutcome::Degraded(_))
    }

    pub fn text(&self) -> &PageText {
        match self {
            PageOutcome::Recognized(text) | PageOutcome::Degraded(text) => text,
        }
    }

    pub fn into_text(self) -> PageText {
        match self {
            PageOutcome::Recognized(text) | PageOutcome::Degraded(text) => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognitionError;
    use crate::recognition::PositionalText;
    use crate::types::{BoundingBox, RecognizedWord};
    use image::{DynamicImage, RgbImage};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum Scripted {
        Words(Vec<RecognizedWord>),
        Plain(&'static str),
        Fail,
    }

    /// Replays scripted responses and records the budget of every call
    struct ScriptedEngine {
        responses: Mutex<VecDeque<Scripted>>,
        calls: Mutex<Vec<(&'static str, Duration)>>,
    }

    impl ScriptedEngine {
        fn new(responses: Vec<Scripted>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn next(&self) -> Scripted {
            self.responses.lock().unwrap().pop_front().unwrap_or(Scripted::Fail)
        }
    }

    impl RecognitionEngine for std::sync::Arc<ScriptedEngine> {
        fn extract_plain_text(&self, _image: &GrayImage, timeout: Duration) -> Result<String, RecognitionError> {
            self.calls.lock().unwrap().push(("plain", timeout));
            match self.next() {
                Scripted::Plain(text) => Ok(text.to_string()),
                _ => Err(RecognitionError::Engine("scripted failure".into())),
            }
        }

        fn extract_positional_text(&self, _image: &GrayImage, timeout: Duration) -> Result<PositionalText, RecognitionError> {
            self.calls.lock().unwrap().push(("positional", timeout));
            match self.next() {
                Scripted::Words(words) => Ok(PositionalText::Words(words)),
                Scripted::Fail => Err(RecognitionError::Timeout(timeout)),
                Scripted::Plain(_) => Err(RecognitionError::Engine("unexpected".into())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn page() -> Page {
        Page {
            index: 4,
            image: DynamicImage::ImageRgb8(RgbImage::new(8, 8)),
        }
    }

    fn words() -> Vec<RecognizedWord> {
        vec![RecognizedWord::new("Invoice", BoundingBox::new(0.0, 0.0, 50.0, 10.0))]
    }

    fn extractor(engine: &std::sync::Arc<ScriptedEngine>) -> PageExtractor {
        PageExtractor::new(Box::new(engine.clone()), &ExtractionConfig::default())
    }

    #[test]
    fn test_first_attempt_success() {
        let engine = std::sync::Arc::new(ScriptedEngine::new(vec![Scripted::Words(words())]));
        let outcome = extractor(&engine).extract_page(&page());
        assert_eq!(outcome, PageOutcome::Recognized(PageText::new(4, "Invoice\n")));
        assert_eq!(*engine.calls.lock().unwrap(), vec![("positional", Duration::from_secs(30))]);
    }

    #[test]
    fn test_blank_result_retries_with_larger_budget() {
        let engine = std::sync::Arc::new(ScriptedEngine::new(vec![
            Scripted::Words(Vec::new()),
            Scripted::Words(words()),
        ]));
        let text = extractor(&engine).extract_page(&page()).into_text();
        assert_eq!(text.text, "Invoice\n");
        assert_eq!(
            *engine.calls.lock().unwrap(),
            vec![("positional", Duration::from_secs(30)), ("positional", Duration::from_secs(60))]
        );
    }

    #[test]
    fn test_falls_back_to_plain_text() {
        let engine = std::sync::Arc::new(ScriptedEngine::new(vec![
            Scripted::Fail,
            Scripted::Fail,
            Scripted::Plain("raw ocr text"),
        ]));
        let outcome = extractor(&engine).extract_page(&page());
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.text().text, "raw ocr text");
        assert_eq!(engine.calls.lock().unwrap()[2], ("plain", Duration::from_secs(60)));
    }

    #[test]
    fn test_total_failure_yields_empty_page() {
        let engine = std::sync::Arc::new(ScriptedEngine::new(Vec::new()));
        let outcome = extractor(&engine).extract_page(&page());
        assert_eq!(outcome, PageOutcome::Degraded(PageText::empty(4)));
        assert_eq!(engine.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_blank_page_is_recognized_not_degraded() {
        let engine = std::sync::Arc::new(ScriptedEngine::new(vec![
            Scripted::Words(Vec::new()),
            Scripted::Words(Vec::new()),
            Scripted::Plain(""),
        ]));
        let outcome = extractor(&engine).extract_page(&page());
        assert_eq!(outcome, PageOutcome::Recognized(PageText::empty(4)));
    }

    #[test]
    fn test_invalid_page_is_empty_without_recognition() {
        let engine = std::sync::Arc::new(ScriptedEngine::new(vec![Scripted::Words(words())]));
        let empty = Page {
            index: 0,
            image: DynamicImage::ImageRgb8(RgbImage::new(0, 0)),
        };
        assert_eq!(
            extractor(&engine).extract_page(&empty),
            PageOutcome::Degraded(PageText::empty(0))
        );
        assert!(engine.calls.lock().unwrap().is_empty());
    }
}
