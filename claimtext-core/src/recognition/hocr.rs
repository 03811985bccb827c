//! hOCR parsing
//!
//! Tesseract's hOCR output tags each word with a `bbox x1 y1 x2 y2` title.
//! Only the word spans are needed for layout reconstruction; pages without
//! word spans fall back to line spans.

use crate::types::{BoundingBox, RecognizedWord};
use regex::Regex;
use std::sync::LazyLock;

// Pre-compiled regexes for hOCR parsing
static WORD_SPAN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span\s[^>]*class=['"]ocrx_word['"][^>]*title=['"]([^'"]*)['"][^>]*>(.*?)</span>"#)
        .unwrap()
});

static LINE_SPAN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span\s[^>]*class=['"]ocr_(?:line|textfloat|header|caption)['"][^>]*title=['"]([^'"]*)['"][^>]*>(.*?)</span>"#)
        .unwrap()
});

static BBOX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bbox (-?\d+) (-?\d+) (-?\d+) (-?\d+)").unwrap());

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Extract positioned words from hOCR markup
pub fn parse_hocr_words(hocr: &str) -> Vec<RecognizedWord> {
    let words = parse_spans(&WORD_SPAN_REGEX, hocr);
    if !words.is_empty() {
        return words;
    }

    let lines = parse_spans(&LINE_SPAN_REGEX, hocr);
    if !lines.is_empty() {
        tracing::debug!(lines = lines.len(), "hOCR has no word spans, using line spans");
    }
    lines
}

fn parse_spans(regex: &Regex, hocr: &str) -> Vec<RecognizedWord> {
    regex
        .captures_iter(hocr)
        .filter_map(|caps| {
            let bbox = parse_bbox(caps.get(1)?.as_str())?;
            let text = clean_text(caps.get(2)?.as_str());
            if text.is_empty() {
                return None;
            }
            Some(RecognizedWord::new(text, bbox))
        })
        .collect()
}

fn parse_bbox(title: &str) -> Option<BoundingBox> {
    let caps = BBOX_REGEX.captures(title)?;
    let coord = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f32>().ok());
    Some(BoundingBox::new(coord(1)?, coord(2)?, coord(3)?, coord(4)?))
}

/// Strip nested tags (`<strong>`, `<em>`, child word spans) and decode entities
fn clean_text(inner: &str) -> String {
    let stripped = TAG_REGEX.replace_all(inner, " ");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    match quick_xml::escape::unescape(&collapsed) {
        Ok(text) => text.into_owned(),
        Err(_) => collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HOCR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
 <body>
  <div class='ocr_page' id='page_1' title='image "page.png"; bbox 0 0 2480 3508; ppageno 0'>
   <p class='ocr_par' id='par_1_1' lang='eng'>
    <span class='ocr_line' id='line_1_1' title="bbox 120 200 900 240; baseline 0 -8; x_size 40">
     <span class='ocrx_word' id='word_1_1' title='bbox 120 200 260 240; x_wconf 95'>Claim</span>
     <span class='ocrx_word' id='word_1_2' title='bbox 270 200 330 240; x_wconf 93'><strong>No.</strong></span>
     <span class='ocrx_word' id='word_1_3' title='bbox 700 201 900 239; x_wconf 91'>A&amp;B-1001</span>
    </span>
   </p>
  </div>
 </body>
</html>"#;

    #[test]
    fn test_parse_word_spans() {
        let words = parse_hocr_words(SAMPLE_HOCR);
        assert_eq!(words.len(), 3);
        assert_eq!(words[0].text, "Claim");
        assert_eq!(words[0].bbox, BoundingBox::new(120.0, 200.0, 260.0, 240.0));
        assert_eq!(words[1].text, "No.");
        assert_eq!(words[2].text, "A&B-1001");
        assert_eq!(words[2].center_y(), 220.0);
    }

    #[test]
    fn test_line_fallback_when_no_words() {
        let hocr = r#"<p class='ocr_par'>
<span class='ocr_line' id='line_1' title="bbox 10 20 300 40; baseline 0 0">Policy Number 12345</span>
</p>"#;
        let words = parse_hocr_words(hocr);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "Policy Number 12345");
        assert_eq!(words[0].bbox.x1, 10.0);
    }

    #[test]
    fn test_empty_words_skipped() {
        let hocr = r#"<span class='ocrx_word' id='w1' title='bbox 1 2 3 4; x_wconf 0'> </span>"#;
        assert!(parse_hocr_words(hocr).is_empty());
    }
}
