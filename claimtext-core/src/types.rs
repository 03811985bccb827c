use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type DocumentId = Uuid;

// ===== PAGE & RECOGNITION TYPES =====
// Pages only live for the duration of one extraction. Words are produced by a
// recognition engine and consumed by the layout parser; neither is persisted.

/// A single rasterized page of a source document
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based position in the source file
    pub index: usize,
    pub image: DynamicImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Smallest box containing every point of a flat `[x, y, x, y, ...]` polygon
    pub fn from_polygon(polygon: &[f32]) -> Option<Self> {
        if polygon.len() < 2 {
            return None;
        }
        let xs = polygon.iter().step_by(2);
        let ys = polygon.iter().skip(1).step_by(2);
        let (x1, x2) = xs.fold((f32::MAX, f32::MIN), |(lo, hi), &x| (lo.min(x), hi.max(x)));
        let (y1, y2) = ys.fold((f32::MAX, f32::MIN), |(lo, hi), &y| (lo.min(y), hi.max(y)));
        Some(Self { x1, y1, x2, y2 })
    }

    pub fn center_x(&self) -> f32 {
        (self.x1 + self.x2) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.y1 + self.y2) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedWord {
    pub text: String,
    pub bbox: BoundingBox,
}

impl RecognizedWord {
    pub fn new(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }

    pub fn x1(&self) -> f32 {
        self.bbox.x1
    }

    pub fn center_x(&self) -> f32 {
        self.bbox.center_x()
    }

    pub fn center_y(&self) -> f32 {
        self.bbox.center_y()
    }
}

/// Words sharing a vertical band, ordered left to right
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub words: Vec<RecognizedWord>,
}

impl Line {
    pub fn text(&self) -> String {
        join_words(&self.words)
    }
}

pub(crate) fn join_words(words: &[RecognizedWord]) -> String {
    words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: Option<String>,
    pub value: String,
}

impl KeyValuePair {
    pub fn is_empty(&self) -> bool {
        self.key.as_deref().map_or(true, str::is_empty) && self.value.is_empty()
    }

    /// `"key: value"` for split lines, the bare value otherwise
    pub fn render(&self) -> String {
        match &self.key {
            Some(key) => format!("{}: {}", key, self.value),
            None => self.value.clone(),
        }
    }
}

/// Reconstructed text of one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub index: usize,
    pub text: String,
}

impl PageText {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    pub fn empty(index: usize) -> Self {
        Self::new(index, String::new())
    }

    pub fn from_pairs(index: usize, pairs: &[KeyValuePair]) -> Self {
        let mut text = String::new();
        for pair in pairs {
            text.push_str(&pair.render());
            text.push('\n');
        }
        Self { index, text }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

// ===== SEGMENTATION TYPES =====

/// Inclusive page range `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Contiguous run of pages believed to be one logical document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub range: PageRange,
    pub text: String,
}

// ===== EXTRACTION OUTPUT =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// The artifact handed to the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum ExtractionResult {
    Text(String),
    Clusters(Vec<Cluster>),
    Table(Vec<Sheet>),
}

impl ExtractionResult {
    pub fn empty() -> Self {
        ExtractionResult::Text(String::new())
    }

    pub fn cluster_texts(&self) -> Vec<&str> {
        match self {
            ExtractionResult::Clusters(clusters) => {
                clusters.iter().map(|c| c.text.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Flatten into the single string the classifier reads
    pub fn to_classifier_text(&self) -> String {
        match self {
            ExtractionResult::Text(text) => text.clone(),
            ExtractionResult::Clusters(clusters) => clusters
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            ExtractionResult::Table(sheets) => {
                let mut out = String::new();
                for sheet in sheets {
                    out.push_str(&format!("## {}\n", sheet.name));
                    for row in &sheet.rows {
                        out.push_str(&row.join("\t"));
                        out.push('\n');
                    }
                }
                out
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ExtractionResult::Text(text) => text.trim().is_empty(),
            ExtractionResult::Clusters(clusters) => clusters.iter().all(|c| c.text.trim().is_empty()),
            ExtractionResult::Table(sheets) => sheets.iter().all(|s| s.rows.is_empty()),
        }
    }
}

// ===== CLASSIFICATION & PERSISTENCE =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub doc_type: String,
    pub summary: String,
}

impl Classification {
    pub fn failed() -> Self {
        Self {
            doc_type: "error".to_string(),
            summary: "Classification failed".to_string(),
        }
    }
}

/// One persisted row per ingested file (top-level or attachment)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub document_name: String,
    pub source: String,
    pub doc_type_predicted: String,
    pub processing_time_ms: u64,
    pub summary: String,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(
        document_name: impl Into<String>,
        source: impl Into<String>,
        classification: Classification,
        processing_time_ms: u64,
        file_url: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_name: document_name.into(),
            source: source.into(),
            doc_type_predicted: classification.doc_type,
            processing_time_ms,
            summary: classification.summary,
            file_url: file_url.into(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_bounds() {
        let bbox = BoundingBox::from_polygon(&[10.0, 5.0, 40.0, 6.0, 41.0, 20.0, 9.0, 19.0]).unwrap();
        assert_eq!(bbox, BoundingBox::new(9.0, 5.0, 41.0, 20.0));
        assert_eq!(bbox.center_x(), 25.0);
        assert!(BoundingBox::from_polygon(&[1.0]).is_none());
    }

    #[test]
    fn test_page_text_from_pairs() {
        let pairs = vec![
            KeyValuePair { key: Some("Claim No".into()), value: "A-1001".into() },
            KeyValuePair { key: None, value: "Signed by the claimant".into() },
        ];
        let page = PageText::from_pairs(3, &pairs);
        assert_eq!(page.text, "Claim No: A-1001\nSigned by the claimant\n");
        assert_eq!(page.index, 3);
    }

    #[test]
    fn test_classifier_text_joins_clusters() {
        let result = ExtractionResult::Clusters(vec![
            Cluster { range: PageRange::new(0, 1), text: "first".into() },
            Cluster { range: PageRange::new(2, 2), text: "second".into() },
        ]);
        assert_eq!(result.to_classifier_text(), "first\nsecond");
        assert_eq!(result.cluster_texts(), vec!["first", "second"]);
    }

    #[test]
    fn test_table_classifier_text() {
        let result = ExtractionResult::Table(vec![Sheet {
            name: "Claims".into(),
            rows: vec![vec!["id".into(), "amount".into()], vec!["7".into(), "120.5".into()]],
        }]);
        assert_eq!(result.to_classifier_text(), "## Claims\nid\tamount\n7\t120.5\n");
    }

    #[test]
    fn test_empty_pairs_detected() {
        assert!(KeyValuePair { key: Some(String::new()), value: String::new() }.is_empty());
        assert!(!KeyValuePair { key: None, value: "x".into() }.is_empty());
    }
}
