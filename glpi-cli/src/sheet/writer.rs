//! Write the status-annotated copy of the input workbook
//!
//! xlsx files are not edited in place: the run writes a sibling workbook
//! carrying every input cell plus the four per-category status columns.

use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;
use std::path::Path;

use crate::batch::RowStatus;

use super::reader::ParsedSheet;
use super::row::{STATUS_HEADERS, col};

/// Write the input rows with their status cells filled in.
///
/// `statuses` must parallel `sheet.rows`; rows the run never reached keep
/// empty status cells.
pub fn write_status_sheet<P: AsRef<Path>>(
    path: P,
    sheet: &ParsedSheet,
    statuses: &[RowStatus],
) -> Result<()> {
    let path = path.as_ref();
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&sheet.sheet_name)?;

    // input headers, extended with the status captions where the sheet
    // did not carry them
    let mut headers = sheet.headers.clone();
    headers.resize(col::COUNT, String::new());
    for (offset, caption) in STATUS_HEADERS.iter().enumerate() {
        let idx = col::STATUS_USER + offset;
        if headers[idx].trim().is_empty() {
            headers[idx] = caption.to_string();
        }
    }
    for (idx, header) in headers.iter().enumerate() {
        worksheet.write_string(0, idx as u16, header)?;
    }

    for (row_idx, record) in sheet.rows.iter().enumerate() {
        let row = (row_idx + 1) as u32;
        for (col_idx, value) in record.cells()[..col::STATUS_USER].iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(row, col_idx as u16, value)?;
            }
        }

        let Some(status) = statuses.get(row_idx) else { continue };
        worksheet.write_string(row, col::STATUS_USER as u16, &status.user.cell_text())?;
        worksheet.write_string(row, col::STATUS_LINE as u16, &status.line.cell_text())?;
        worksheet.write_string(row, col::STATUS_MOBILE as u16, &status.mobile.cell_text())?;
        worksheet.write_string(row, col::STATUS_NOTEBOOK as u16, &status.notebook.cell_text())?;
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;

    log::info!("status workbook written to {}", path.display());
    Ok(())
}
