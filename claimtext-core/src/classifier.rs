use crate::config::SummaryConfig;
use crate::types::Classification;
use anyhow::Result;

/// Classify-and-summarize boundary. Real deployments plug an LLM in here.
pub trait DocumentClassifier {
    fn classify(&self, text: &str) -> Result<Classification>;
}

pub const FALLBACK_DOC_TYPE: &str = "Other Reports";

/// Claims document categories and the phrases that identify them
const CATEGORY_PHRASES: &[(&str, &[&str])] = &[
    (
        "Policy Documents",
        &["policy number", "coverage limits", "deductible", "premium", "policyholder", "effective date", "terms and conditions"],
    ),
    (
        "Proof of Loss",
        &["notice of loss", "claim number", "date of loss", "extent of damage", "sworn statement", "claimant signature"],
    ),
    (
        "Police Reports",
        &["incident report", "case number", "officer badge", "citation", "violation", "arrested", "police department"],
    ),
    (
        "Medical Bills",
        &["patient", "diagnosis", "treatment", "physician", "hospital", "medical history", "prescription"],
    ),
    (
        "Repair Estimates and Invoices",
        &["estimate", "labor costs", "parts", "repair", "invoice", "service provider", "total cost"],
    ),
    (
        "Investigation Reports",
        &["investigation findings", "analysis", "assessment", "liability determination", "evidence review"],
    ),
    (
        "Legal and Demand Letters",
        &["subpoena", "court order", "attorney", "legal proceeding", "settlement", "power of attorney"],
    ),
];

/// Offline classifier: picks the category with the most phrase hits and
/// summarizes with the leading characters of the text.
pub struct KeywordClassifier {
    summary: SummaryConfig,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(SummaryConfig::default())
    }
}

impl KeywordClassifier {
    pub fn new(summary: SummaryConfig) -> Self {
        Self { summary }
    }

    fn score(text: &str) -> Option<&'static str> {
        let mut best: Option<(&'static str, usize)> = None;
        for &(doc_type, phrases) in CATEGORY_PHRASES {
            let hits = phrases.iter().filter(|p| text.contains(*p)).count();
            // ties keep the earlier category
            if hits > 0 && best.map_or(true, |(_, h)| hits > h) {
                best = Some((doc_type, hits));
            }
        }
        best.map(|(doc_type, _)| doc_type)
    }

    fn summarize(&self, text: &str) -> String {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(self.summary.max_chars).collect()
    }
}

impl DocumentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<Classification> {
        let lowered = text.to_lowercase();
        let doc_type = Self::score(&lowered).unwrap_or(FALLBACK_DOC_TYPE);
        tracing::debug!(doc_type, chars = text.len(), "keyword classification");

        Ok(Classification {
            doc_type: doc_type.to_string(),
            summary: self.summarize(text),
        })
    }
}
