#![allow(clippy::needless_return)]

mod entry;
mod patch;
mod persistence;
mod projector;
mod session;
mod sort;
mod validation;
mod workbook;
pub mod utils;

// Test utilities - only compiled when testing or with test feature
// #[cfg(test)] alone doesn't work for integration tests (they're external crates)
// The feature flag makes it available to integration tests via dev-dependencies
#[cfg(any(test, feature = "test"))]
pub mod test_utils;

pub use entry::{Entry, NumberedEntry, number_entries};
pub use patch::{CellPatch, SheetPatches, patch_xlsx};
pub use persistence::{
    ImportError, default_export_file_name, entries_schema, export_entries_json,
    import_entries_json,
};
pub use projector::{
    APPLICABLE_TOKEN, ColumnMap, FORM_FILE_NAME, FORM_SHEET_NAME, FormLayout,
    MEDICAL_EXPENSE_FORM, WorkbookProjector,
};
pub use session::EntrySession;
pub use sort::{SortMethod, sort_entries};
pub use validation::{
    EntryValidator, INSTITUTION_CHAR_LIMIT, NAME_CHAR_LIMIT, ValidationError, ValidatorConfig,
    find_duplicate, is_category_missing, is_duplicate, is_expense_unset, is_institution_empty,
    is_institution_too_long, is_name_empty, is_name_too_long, is_out_of_range_date,
};
pub use workbook::{CellValue, TemplateWorkbook, WorkbookError, Worksheet};

pub const ERRORS_LOG_FILE: &str = "errors.log";
