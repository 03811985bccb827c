//! Layout parser: positional words → lines → key/value pairs
//!
//! Claim forms are mostly two-column `label   value` layouts. Each line is split
//! around the median left edge of its words; lines without a clear gap on both
//! sides of the median degrade to value-only pairs.

use crate::config::LayoutConfig;
use crate::types::{join_words, KeyValuePair, Line, PageText, RecognizedWord};

pub struct LayoutParser {
    config: LayoutConfig,
}

impl Default for LayoutParser {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutParser {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn parse(&self, words: Vec<RecognizedWord>) -> Vec<KeyValuePair> {
        group_words_into_lines(words, self.config.y_tolerance)
            .iter()
            .map(|line| split_key_value(line, self.config.x_tolerance))
            .filter(|pair| !pair.is_empty())
            .collect()
    }

    pub fn parse_page(&self, index: usize, words: Vec<RecognizedWord>) -> PageText {
        PageText::from_pairs(index, &self.parse(words))
    }
}

/// Group words into lines top to bottom. A word joins the current line while its
/// vertical center is within `y_tolerance` of the line's first word.
pub fn group_words_into_lines(mut words: Vec<RecognizedWord>, y_tolerance: f32) -> Vec<Line> {
    words.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()));

    let mut lines = Vec::new();
    let mut current: Vec<RecognizedWord> = Vec::new();
    let mut anchor_y = 0.0f32;

    for word in words {
        if current.is_empty() {
            anchor_y = word.center_y();
            current.push(word);
        } else if (word.center_y() - anchor_y).abs() <= y_tolerance {
            current.push(word);
        } else {
            lines.push(close_line(std::mem::take(&mut current)));
            anchor_y = word.center_y();
            current.push(word);
        }
    }
    if !current.is_empty() {
        lines.push(close_line(current));
    }

    lines
}

fn close_line(mut words: Vec<RecognizedWord>) -> Line {
    words.sort_by(|a, b| a.x1().total_cmp(&b.x1()));
    Line { words }
}

/// Split a line into key and value regions around the median `x1`
pub fn split_key_value(line: &Line, x_tolerance: f32) -> KeyValuePair {
    let Some(median) = median(line.words.iter().map(|w| w.x1()).collect()) else {
        return KeyValuePair {
            key: None,
            value: String::new(),
        };
    };

    let key_words: Vec<RecognizedWord> = line
        .words
        .iter()
        .filter(|w| w.x1() <= median - x_tolerance)
        .cloned()
        .collect();
    let value_words: Vec<RecognizedWord> = line
        .words
        .iter()
        .filter(|w| w.x1() > median + x_tolerance)
        .cloned()
        .collect();

    if !key_words.is_empty() && !value_words.is_empty() {
        KeyValuePair {
            key: Some(join_words(&key_words).trim().to_string()),
            value: join_words(&value_words).trim().to_string(),
        }
    } else {
        KeyValuePair {
            key: None,
            value: line.text().trim().to_string(),
        }
    }
}

/// Median that averages the two middle values for even counts
fn median(mut values: Vec<f32>) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
