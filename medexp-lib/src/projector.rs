use crate::entry::{Entry, number_entries};
use crate::sort::{SortMethod, sort_entries};
use crate::patch::{SheetPatches, patch_xlsx};
use crate::workbook::{CellValue, TemplateWorkbook, WorkbookError};

/// Name of the worksheet in the tax office's template.
pub const FORM_SHEET_NAME: &str = "医療費集計フォーム";
/// File name used when the filled form is saved.
pub const FORM_FILE_NAME: &str = "医療費集計フォーム.xlsx";
/// Written into a category column when the category applies.
pub const APPLICABLE_TOKEN: &str = "該当する";

/// Column of each entry field in a data row (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: u16,
    pub institution: u16,
    pub treatment: u16,
    pub medication: u16,
    pub care_service: u16,
    pub other_medical_expenses: u16,
    pub medical_expense: u16,
    pub reimbursed_amount: u16,
    pub payment_date: u16,
}

/// Where entries land in the target worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormLayout {
    pub sheet_name: &'static str,
    /// First data row; the rows above it are the template's header.
    pub first_data_row: u32,
    pub columns: ColumnMap,
    pub applicable_token: &'static str,
    pub date_format: &'static str,
}

/// Layout of the National Tax Agency medical expense summary form.
pub const MEDICAL_EXPENSE_FORM: FormLayout = FormLayout {
    sheet_name: FORM_SHEET_NAME,
    first_data_row: 9,
    columns: ColumnMap {
        name: 2,
        institution: 3,
        treatment: 4,
        medication: 5,
        care_service: 6,
        other_medical_expenses: 7,
        medical_expense: 8,
        reimbursed_amount: 9,
        payment_date: 10,
    },
    applicable_token: APPLICABLE_TOKEN,
    date_format: "%Y/%m/%d",
};

impl Default for FormLayout {
    fn default() -> Self {
        MEDICAL_EXPENSE_FORM
    }
}

impl FormLayout {
    /// Worksheet row for the entry at zero-based position `index` after sorting.
    pub fn row_for(&self, index: usize) -> u32 {
        self.first_data_row + index as u32
    }
}

/// Writes accumulated entries into the template worksheet.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookProjector {
    layout: FormLayout,
}

impl WorkbookProjector {
    pub fn new(layout: FormLayout) -> Self {
        WorkbookProjector { layout }
    }

    /// The cell edits that write `entries` from the first data row on.
    ///
    /// Entries are ordered by payment date (undated first, ties in list order).
    /// Only the data rows for these entries are touched; the header rows, any
    /// rows below the data and every other worksheet are left as they were.
    pub fn cell_patches(&self, entries: &[Entry]) -> SheetPatches {
        let mut patches = SheetPatches::new();
        let sorted = sort_entries(&number_entries(entries), SortMethod::ByPaymentDate);
        for (index, numbered) in sorted.iter().enumerate() {
            self.write_row(&mut patches, self.layout.row_for(index), &numbered.entry);
        }
        patches
    }

    /// Return a copy of `template` with `entries` written into the form sheet.
    pub fn project(
        &self,
        entries: &[Entry],
        template: &TemplateWorkbook,
    ) -> Result<TemplateWorkbook, WorkbookError> {
        let mut workbook = template.clone();
        let worksheet = workbook.worksheet_mut(self.layout.sheet_name)?;
        self.cell_patches(entries).apply_to(worksheet);
        Ok(workbook)
    }

    /// Fill the form sheet of an xlsx template file and return the new file.
    ///
    /// Only the edited cells change; the rest of the package (styles, merged
    /// cells, column widths, other sheets) is kept byte for byte.
    pub fn project_xlsx(
        &self,
        entries: &[Entry],
        template: &[u8],
    ) -> Result<Vec<u8>, WorkbookError> {
        patch_xlsx(template, self.layout.sheet_name, &self.cell_patches(entries))
    }

    fn write_row(&self, patches: &mut SheetPatches, row: u32, entry: &Entry) {
        let columns = &self.layout.columns;

        // the id is not written
        patches.set(row, columns.name, CellValue::String(entry.name.clone()));
        patches.set(
            row,
            columns.institution,
            CellValue::String(entry.institution.clone()),
        );

        for (column, applies) in [
            (columns.treatment, entry.includes_treatment),
            (columns.medication, entry.includes_medication),
            (columns.care_service, entry.includes_care_service),
            (columns.other_medical_expenses, entry.includes_other_medical_expenses),
        ] {
            if applies {
                let token = CellValue::String(self.layout.applicable_token.to_string());
                patches.set(row, column, token);
            } else {
                patches.clear(row, column);
            }
        }

        patches.set(
            row,
            columns.medical_expense,
            CellValue::Number(entry.medical_expense_value().unwrap_or(0.0)),
        );
        let reimbursed = if entry.reimbursed_amount.is_finite() {
            entry.reimbursed_amount
        } else {
            0.0
        };
        patches.set(row, columns.reimbursed_amount, CellValue::Number(reimbursed));

        match entry.payment_date {
            Some(date) => patches.set(
                row,
                columns.payment_date,
                CellValue::String(date.format(self.layout.date_format).to_string()),
            ),
            None => patches.clear(row, columns.payment_date),
        }
    }
}
