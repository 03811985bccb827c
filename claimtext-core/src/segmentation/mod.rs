//! Multi-page semantic segmentation
//!
//! Scanned claim files often bundle several logical documents (police report,
//! medical bill, photo log) into one TIFF. The segmenter regroups pages into
//! contiguous clusters:
//!
//! ```text
//! PageText × n
//!     ↓ embed (MiniLM)
//! vectors × n
//!     ↓ average-linkage clustering (cosine, threshold 0.65)
//! labels × n
//!     ↓ cut on label change (page order is never rearranged)
//! boundaries
//!     ↓ relax edges by `relax_pages`
//! Cluster × k
//! ```

pub mod agglomerative;
pub mod embedder;

use crate::config::SegmentationConfig;
use crate::types::{Cluster, PageRange, PageText};

pub use embedder::Embedder;
#[cfg(feature = "onnx-embedder")]
pub use embedder::OnnxEmbedder;

pub struct Segmenter {
    embedder: Box<dyn Embedder>,
    config: SegmentationConfig,
}

impl Segmenter {
    pub fn new(embedder: Box<dyn Embedder>, config: SegmentationConfig) -> Self {
        Self { embedder, config }
    }

    pub fn segment(&mut self, pages: &[PageText]) -> Vec<Cluster> {
        if pages.is_empty() {
            return Vec::new();
        }
        let whole = || vec![PageRange::new(0, pages.len() - 1)];

        let ranges = if pages.len() < 2 {
            whole()
        } else {
            match self.cluster_ranges(pages) {
                Ok(ranges) => ranges,
                Err(e) => {
                    tracing::warn!(
                        pages = pages.len(),
                        embedder = self.embedder.name(),
                        error = %e,
                        "page embedding failed, keeping the file as one cluster"
                    );
                    whole()
                }
            }
        };

        materialize(pages, &ranges)
    }

    fn cluster_ranges(&mut self, pages: &[PageText]) -> anyhow::Result<Vec<PageRange>> {
        let texts: Vec<String> = pages.iter().map(|p| p.text.clone()).collect();
        let vectors = self.embedder.embed(&texts)?;
        if vectors.len() != pages.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} pages",
                vectors.len(),
                pages.len()
            );
        }

        let labels = agglomerative::cluster_labels(&vectors, self.config.distance_threshold);
        let boundaries = sequential_boundaries(&labels);
        let relaxed = relax_boundaries(&boundaries, self.config.relax_pages);
        tracing::debug!(?labels, ?boundaries, ?relaxed, "segmented pages");
        Ok(relaxed)
    }
}

/// Cut a new range wherever the label differs from the previous page's
pub fn sequential_boundaries(labels: &[usize]) -> Vec<PageRange> {
    let mut ranges = Vec::new();
    let Some(&first) = labels.first() else {
        return ranges;
    };

    let mut start = 0;
    let mut current = first;
    for (i, &label) in labels.iter().enumerate().skip(1) {
        if label != current {
            ranges.push(PageRange::new(start, i - 1));
            start = i;
            current = label;
        }
    }
    ranges.push(PageRange::new(start, labels.len() - 1));
    ranges
}

/// Widen interior edges by up to `relax_pages`.
///
/// For range `i`: start becomes `max(prev_new_end + 1, start)` (except the first),
/// end becomes `min(end + relax_pages, next_start)` (except the last). The first
/// start and last end never move. Ranges left empty after their neighbour took
/// their pages are dropped, so each page keeps exactly one owner.
pub fn relax_boundaries(boundaries: &[PageRange], relax_pages: usize) -> Vec<PageRange> {
    let mut relaxed: Vec<PageRange> = Vec::with_capacity(boundaries.len());
    let mut prev_end: Option<usize> = None;

    for (i, range) in boundaries.iter().enumerate() {
        let start = match prev_end {
            Some(end) if i > 0 => (end + 1).max(range.start),
            _ => range.start,
        };
        let end = match boundaries.get(i + 1) {
            Some(next) => (range.end + relax_pages).min(next.start),
            None => range.end,
        };

        if start > end {
            continue;
        }
        relaxed.push(PageRange::new(start, end));
        prev_end = Some(prev_end.map_or(end, |p| p.max(end)));
    }

    relaxed
}

fn materialize(pages: &[PageText], ranges: &[PageRange]) -> Vec<Cluster> {
    ranges
        .iter()
        .map(|range| Cluster {
            range: *range,
            text: pages[range.start..=range.end]
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(pairs: &[(usize, usize)]) -> Vec<PageRange> {
        pairs.iter().map(|&(s, e)| PageRange::new(s, e)).collect()
    }

    /// Returns a fixed vector per page, keyed by the page text's first character
    struct TopicEmbedder;

    impl Embedder for TopicEmbedder {
        fn embed(&mut self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| match t.chars().next() {
                    Some('P') => vec![1.0, 0.0, 0.0],
                    Some('M') => vec![0.0, 1.0, 0.0],
                    _ => vec![0.0, 0.0, 1.0],
                })
                .collect())
        }

        fn name(&self) -> &str {
            "topic"
        }
    }

    struct PanickingEmbedder;

    impl Embedder for PanickingEmbedder {
        fn embed(&mut self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            panic!("single-page documents must not be embedded");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&mut self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("model unavailable")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn pages(texts: &[&str]) -> Vec<PageText> {
        texts.iter().enumerate().map(|(i, t)| PageText::new(i, *t)).collect()
    }

    #[test]
    fn test_boundaries_follow_label_changes() {
        assert_eq!(sequential_boundaries(&[0, 0, 1, 1, 1]), ranges(&[(0, 1), (2, 4)]));
        assert_eq!(sequential_boundaries(&[0, 1, 0]), ranges(&[(0, 0), (1, 1), (2, 2)]));
        assert_eq!(sequential_boundaries(&[3]), ranges(&[(0, 0)]));
        assert!(sequential_boundaries(&[]).is_empty());
    }

    #[test]
    fn test_relax_two_clusters_over_five_pages() {
        // (0,1),(2,4) → (0, min(2,2)) and (max(3,2), 4)
        assert_eq!(relax_boundaries(&ranges(&[(0, 1), (2, 4)]), 1), ranges(&[(0, 2), (3, 4)]));
    }

    #[test]
    fn test_relax_zero_is_identity() {
        let boundaries = ranges(&[(0, 2), (3, 3), (4, 7)]);
        assert_eq!(relax_boundaries(&boundaries, 0), boundaries);
    }

    #[test]
    fn test_relax_single_page_gaps() {
        assert_eq!(relax_boundaries(&ranges(&[(0, 0), (1, 1)]), 1), ranges(&[(0, 1)]));
        assert_eq!(
            relax_boundaries(&ranges(&[(0, 0), (1, 1), (2, 2)]), 1),
            ranges(&[(0, 1), (2, 2)])
        );
        assert_eq!(
            relax_boundaries(&ranges(&[(0, 1), (2, 2), (3, 4)]), 1),
            ranges(&[(0, 2), (3, 3), (4, 4)])
        );
    }

    #[test]
    fn test_relax_wide_budget_is_capped_at_next_start() {
        assert_eq!(
            relax_boundaries(&ranges(&[(0, 3), (4, 9), (10, 12)]), 3),
            ranges(&[(0, 4), (5, 10), (11, 12)])
        );
    }

    #[test]
    fn test_relaxed_ranges_partition_pages() {
        let label_sequences: Vec<Vec<usize>> = vec![
            vec![0, 1, 0, 1, 0, 1],
            vec![0, 0, 0, 1],
            vec![0, 1, 1, 2, 3, 3, 3, 4],
            vec![5, 5],
        ];
        for labels in label_sequences {
            for relax in 0..3 {
                let relaxed = relax_boundaries(&sequential_boundaries(&labels), relax);
                let owned: Vec<usize> = relaxed.iter().flat_map(|r| r.start..=r.end).collect();
                assert_eq!(owned, (0..labels.len()).collect::<Vec<_>>(), "labels {labels:?} relax {relax}");
                assert_eq!(relaxed.first().map(|r| r.start), Some(0));
                assert_eq!(relaxed.last().map(|r| r.end), Some(labels.len() - 1));
            }
        }
    }

    #[test]
    fn test_single_page_never_embedded() {
        let mut segmenter = Segmenter::new(Box::new(PanickingEmbedder), SegmentationConfig::default());
        let clusters = segmenter.segment(&pages(&["Police report"]));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].range, PageRange::new(0, 0));
        assert_eq!(clusters[0].text, "Police report");
    }

    #[test]
    fn test_five_page_bundle() {
        let mut segmenter = Segmenter::new(Box::new(TopicEmbedder), SegmentationConfig::default());
        let clusters = segmenter.segment(&pages(&["P1", "P2", "M3", "M4", "M5"]));
        assert_eq!(
            clusters.iter().map(|c| c.range).collect::<Vec<_>>(),
            ranges(&[(0, 2), (3, 4)])
        );
        assert_eq!(clusters[0].text, "P1\nP2\nM3");
        assert_eq!(clusters[1].text, "M4\nM5");
    }

    #[test]
    fn test_embedding_failure_degrades_to_one_cluster() {
        let mut segmenter = Segmenter::new(Box::new(FailingEmbedder), SegmentationConfig::default());
        let clusters = segmenter.segment(&pages(&["a", "b", "c"]));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].range, PageRange::new(0, 2));
        assert_eq!(clusters[0].text, "a\nb\nc");
    }
}
