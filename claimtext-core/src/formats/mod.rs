//! Format kinds and the text-native extraction strategies
//!
//! Dispatch is a closed enum over file extensions. Image kinds go through the
//! OCR pipeline in the processor; everything else is handled here.
//!
//! ## Strategies
//!
//! - `pdf` - embedded text, page by page (lopdf)
//! - `office` - DOCX paragraphs (zip + quick-xml)
//! - `spreadsheet` - every sheet as a table (calamine)
//! - `email` - plain-text body of an RFC 822 message (mail-parser)
//! - `outlook` - MSG body and attachments, plus attachment staging (msg_parser)

pub mod email;
pub mod office;
pub mod outlook;
pub mod pdf;
pub mod spreadsheet;

use std::path::Path;

pub use outlook::{ContainerAttachment, ContainerMessage, StagingReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatKind {
    /// tiff, tif, jpeg, jpg, png
    Image,
    /// xls, xlsx, xlsm, ods
    Spreadsheet,
    /// docx
    OfficeDocument,
    Pdf,
    /// eml
    Email,
    /// msg
    ContainerMessage,
    /// Anything else, with the lowercased extension (empty when there is none)
    Unsupported(String),
}

impl FormatKind {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "tiff" | "tif" | "jpeg" | "jpg" | "png" => FormatKind::Image,
            "xls" | "xlsx" | "xlsm" | "ods" => FormatKind::Spreadsheet,
            "docx" => FormatKind::OfficeDocument,
            "pdf" => FormatKind::Pdf,
            "eml" => FormatKind::Email,
            "msg" => FormatKind::ContainerMessage,
            _ => FormatKind::Unsupported(extension),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, FormatKind::ContainerMessage)
    }
}
