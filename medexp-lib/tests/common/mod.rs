//! Common test utilities for the medexp-lib integration tests

use medexp_lib::{CellValue, EntryValidator, FORM_SHEET_NAME, TemplateWorkbook, ValidatorConfig};

// Re-export shared test utilities from src/test_utils.rs
pub use medexp_lib::test_utils::{
    create_template_workbook, create_template_xlsx, create_valid_entry, workbook_to_xlsx,
};

pub const FISCAL_YEAR: i32 = 2023;

#[allow(dead_code)]
pub fn create_validator() -> EntryValidator {
    EntryValidator::new(ValidatorConfig::new(FISCAL_YEAR))
}

/// Values of columns 2..=10 of a row of the form sheet, rendered as text.
#[allow(dead_code)]
pub fn form_row(workbook: &TemplateWorkbook, row: u32) -> Vec<String> {
    let sheet = workbook.worksheet(FORM_SHEET_NAME).unwrap();
    (2..=10)
        .map(|column| match sheet.cell(row, column) {
            None => String::new(),
            Some(CellValue::String(s)) => s.clone(),
            Some(CellValue::Number(n)) => n.to_string(),
            Some(CellValue::Bool(b)) => b.to_string(),
            Some(CellValue::DateTime(serial)) => format!("#{serial}"),
            Some(CellValue::Formula(f)) => format!("={f}"),
        })
        .collect()
}
