//! Read the input workbook

use anyhow::{Context, Result, bail};
use calamine::{Reader, Xlsx, open_workbook};
use std::path::Path;

use super::row::RowRecord;

/// Parsed input workbook: the header row plus the data rows.
#[derive(Debug, Clone)]
pub struct ParsedSheet {
    pub sheet_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RowRecord>,
}

/// Read the first worksheet of an input file into row records. Fully
/// blank rows are dropped; trailing blank cells are padded so every row
/// has the full column count.
pub fn read_input_sheet<P: AsRef<Path>>(path: P) -> Result<ParsedSheet> {
    let path = path.as_ref();
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open Excel file: {}", path.display()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("workbook has no sheets")?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row.iter().map(super::row::cell_to_string).collect(),
        None => bail!("sheet '{}' is empty", sheet_name),
    };

    let mut rows = Vec::new();
    for (idx, cells) in rows_iter.enumerate() {
        // sheet rows are 1-based and the header occupies row 1
        let record = RowRecord::from_cells(idx as u32 + 2, cells);
        if record.has_data() {
            rows.push(record);
        }
    }

    log::info!(
        "read {} data rows from '{}' ({})",
        rows.len(),
        sheet_name,
        path.display()
    );

    Ok(ParsedSheet {
        sheet_name,
        headers,
        rows,
    })
}
