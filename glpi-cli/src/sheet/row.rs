//! Row schema for the input workbook
//!
//! Columns map positionally to a fixed, versioned layout; the provisioning
//! core only ever sees the unpacked scalar values. The four trailing
//! columns are the per-category status cells written back after the run.

use calamine::Data;

/// Column indices, schema version 3 (entity level D, line operator,
/// hardware components and contract/financial columns included).
pub mod col {
    pub const FULL_NAME: usize = 0;
    pub const EMAIL: usize = 1;
    pub const NATIONAL_ID: usize = 2;
    pub const MOBILE: usize = 3;
    pub const TITLE: usize = 4;
    pub const ENTITY_A: usize = 5;
    pub const ENTITY_B: usize = 6;
    pub const ENTITY_C: usize = 7;
    pub const ENTITY_D: usize = 8;
    pub const LINE_NUMBER: usize = 9;
    pub const LINE_OPERATOR: usize = 10;
    pub const PHONE_BRAND: usize = 11;
    pub const PHONE_MODEL: usize = 12;
    pub const PHONE_IMEI: usize = 13;
    pub const NB_BRAND: usize = 14;
    pub const NB_MODEL: usize = 15;
    pub const NB_SERIAL: usize = 16;
    pub const NB_STORAGE: usize = 17;
    pub const NB_PROCESSOR: usize = 18;
    pub const NB_MEMORY: usize = 19;
    pub const CONTRACT: usize = 20;
    pub const SUPPLIER: usize = 21;
    pub const PURCHASE_DATE: usize = 22;
    pub const PURCHASE_VALUE: usize = 23;
    pub const STATUS_USER: usize = 24;
    pub const STATUS_LINE: usize = 25;
    pub const STATUS_MOBILE: usize = 26;
    pub const STATUS_NOTEBOOK: usize = 27;
    pub const COUNT: usize = 28;
}

/// Header captions for the status columns, appended when the input sheet
/// does not carry them yet.
pub const STATUS_HEADERS: [&str; 4] = ["Input User", "Input Line", "Input Mobile", "Input Notebook"];

/// One data row, cells coerced to trimmed strings.
#[derive(Debug, Clone)]
pub struct RowRecord {
    /// 1-based row number in the sheet, for log and status reporting
    pub sheet_row: u32,
    cells: Vec<String>,
}

impl RowRecord {
    pub fn from_cells(sheet_row: u32, cells: &[Data]) -> Self {
        let mut values: Vec<String> = cells.iter().map(cell_to_string).collect();
        values.resize(col::COUNT, String::new());
        Self {
            sheet_row,
            cells: values,
        }
    }

    #[cfg(test)]
    pub fn from_strings(sheet_row: u32, cells: &[&str]) -> Self {
        let mut values: Vec<String> = cells.iter().map(|s| s.to_string()).collect();
        values.resize(col::COUNT, String::new());
        Self {
            sheet_row,
            cells: values,
        }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    fn cell(&self, idx: usize) -> &str {
        self.cells[idx].trim()
    }

    /// Cell as an optional value: empty after trimming means absent.
    pub fn opt(&self, idx: usize) -> Option<&str> {
        let value = self.cell(idx);
        (!value.is_empty()).then_some(value)
    }

    pub fn full_name(&self) -> &str {
        self.cell(col::FULL_NAME)
    }

    pub fn email(&self) -> &str {
        self.cell(col::EMAIL)
    }

    pub fn entity_a(&self) -> Option<&str> {
        self.opt(col::ENTITY_A)
    }

    pub fn entity_b(&self) -> Option<&str> {
        self.opt(col::ENTITY_B)
    }

    pub fn entity_c(&self) -> Option<&str> {
        self.opt(col::ENTITY_C)
    }

    pub fn entity_d(&self) -> Option<&str> {
        self.opt(col::ENTITY_D)
    }

    /// True when the data columns carry anything at all; fully blank rows
    /// are skipped by the reader.
    pub fn has_data(&self) -> bool {
        self.cells[..col::STATUS_USER].iter().any(|c| !c.trim().is_empty())
    }

    pub fn wants_user(&self) -> bool {
        !self.full_name().is_empty()
    }

    pub fn wants_line(&self) -> bool {
        self.opt(col::LINE_NUMBER).is_some()
    }

    pub fn wants_phone(&self) -> bool {
        self.opt(col::PHONE_MODEL).is_some() || self.opt(col::PHONE_IMEI).is_some()
    }

    pub fn wants_notebook(&self) -> bool {
        self.opt(col::NB_MODEL).is_some()
    }
}

/// Coerce a worksheet cell to a string.
///
/// Whole-number floats lose the trailing `.0` (IMEIs and serials arrive
/// as numbers), datetimes keep their display form for the normalization
/// step downstream.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}
