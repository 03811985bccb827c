use crate::error::ExtractionError;
use crate::types::Sheet;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// Load every worksheet as rows of rendered cells. Fully empty rows are dropped.
pub fn extract_sheets(path: &Path) -> Result<Vec<Sheet>, ExtractionError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ExtractionError::decode(path, e))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!(path = %path.display(), sheet = %name, error = %e, "skipping unreadable sheet");
                continue;
            }
        };

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(render_cell).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();
        sheets.push(Sheet { name, rows });
    }

    tracing::debug!(path = %path.display(), sheets = sheets.len(), "loaded spreadsheet");
    Ok(sheets)
}

fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR:{e:?}"),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}
