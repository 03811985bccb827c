use crate::error::ExtractionError;
use base64::Engine as _;
use msg_parser::Outlook;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ContainerAttachment {
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

/// Parsed Outlook message: plain-text body and raw attachments
#[derive(Debug, Clone, Default)]
pub struct ContainerMessage {
    pub body: String,
    pub attachments: Vec<ContainerAttachment>,
}

impl ContainerMessage {
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let outlook = Outlook::from_path(path).map_err(|e| ExtractionError::MalformedContainer {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let attachments = outlook
            .attachments
            .iter()
            .map(|att| {
                let name = if att.file_name.trim().is_empty() {
                    att.display_name.trim()
                } else {
                    att.file_name.trim()
                };
                ContainerAttachment {
                    filename: (!name.is_empty()).then(|| name.to_string()),
                    data: decode_payload(&att.payload),
                }
            })
            .collect();

        Ok(Self {
            body: outlook.body,
            attachments,
        })
    }
}

/// Attachment payloads come back as text; hex first, then base64, then raw bytes.
pub fn decode_payload(payload: &str) -> Vec<u8> {
    let trimmed = payload.trim();
    if let Some(bytes) = decode_hex(trimmed) {
        return bytes;
    }
    base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .unwrap_or_else(|_| payload.as_bytes().to_vec())
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.is_empty() || s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingReport {
    /// Every attachment path now on disk for this message, newly saved or not
    pub staged: Vec<PathBuf>,
    pub saved: usize,
    pub skipped_existing: usize,
    pub skipped_unnamed: usize,
}

/// Write attachments to `{root}/{msg_stem}/{msg_stem}{att_stem}{att_ext}`.
///
/// Files that already exist are left untouched but still reported as staged.
pub fn stage_attachments(
    message_path: &Path,
    message: &ContainerMessage,
    staging_root: &Path,
) -> Result<StagingReport, ExtractionError> {
    let msg_stem = message_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let folder = staging_root.join(&msg_stem);
    std::fs::create_dir_all(&folder).map_err(|e| ExtractionError::filesystem(&folder, e))?;

    let mut report = StagingReport::default();
    for attachment in &message.attachments {
        let Some(filename) = attachment.filename.as_deref() else {
            let err = ExtractionError::MalformedContainer {
                path: message_path.to_path_buf(),
                reason: "attachment without a filename".to_string(),
            };
            tracing::warn!(error = %err, "skipping attachment");
            report.skipped_unnamed += 1;
            continue;
        };

        let name = Path::new(filename);
        let att_stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let att_ext = name
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let target = folder.join(format!("{msg_stem}{att_stem}{att_ext}"));

        if target.exists() {
            tracing::debug!(path = %target.display(), "attachment already staged");
            report.skipped_existing += 1;
        } else {
            std::fs::write(&target, &attachment.data)
                .map_err(|e| ExtractionError::filesystem(&target, e))?;
            tracing::info!(path = %target.display(), bytes = attachment.data.len(), "staged attachment");
            report.saved += 1;
        }
        report.staged.push(target);
    }

    Ok(report)
}
