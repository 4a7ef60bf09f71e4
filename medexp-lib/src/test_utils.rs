// Test utilities available to both unit and integration tests
// Only compiled when testing

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Formula, Workbook};

use crate::entry::Entry;
use crate::projector::FORM_SHEET_NAME;
use crate::workbook::{CellValue, TemplateWorkbook, Worksheet};

/// A candidate that passes every check for fiscal year 2023 (treatment selected).
#[allow(dead_code)]
pub fn create_valid_entry(
    name: &str,
    institution: &str,
    medical_expense: f64,
    payment_date: Option<(i32, u32, u32)>,
) -> Entry {
    Entry {
        name: name.to_string(),
        institution: institution.to_string(),
        includes_treatment: true,
        medical_expense: Some(medical_expense),
        payment_date: payment_date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        ..Entry::draft()
    }
}

/// Header text of the template, rows 1 to 8.
#[allow(dead_code)]
pub fn template_header_rows() -> Vec<(u32, u16, &'static str)> {
    vec![
        (1, 2, "医療費集計フォーム"),
        (3, 2, "医療を受けた方の氏名"),
        (3, 3, "病院・薬局などの支払先の名称"),
        (3, 4, "診療・治療"),
        (3, 5, "医薬品購入"),
        (3, 6, "介護保険サービス"),
        (3, 7, "その他の医療費"),
        (3, 8, "支払った医療費の金額"),
        (3, 9, "左のうち、補填される金額"),
        (3, 10, "支払年月日"),
        (8, 2, "(例) 国税 太郎"),
    ]
}

/// An in-memory stand-in for the tax office's template: a cover sheet, the
/// form sheet with its header, an example date and a totals formula, and a
/// notes sheet.
#[allow(dead_code)]
pub fn create_template_workbook() -> TemplateWorkbook {
    let mut cover = Worksheet::new("はじめに");
    cover.set_cell(1, 1, CellValue::String("使い方".to_string()));

    let mut form = Worksheet::new(FORM_SHEET_NAME);
    for (row, column, text) in template_header_rows() {
        form.set_cell(row, column, CellValue::String(text.to_string()));
    }
    form.set_cell(5, 8, CellValue::Formula("SUM(H9:H1008)".to_string()));
    // 2023/01/01 in the example row
    form.set_cell(8, 10, CellValue::DateTime(44927.0));

    let mut notes = Worksheet::new("notes");
    notes.set_cell(9, 2, CellValue::String("untouched".to_string()));

    let mut workbook = TemplateWorkbook::new();
    workbook.add_worksheet(cover);
    workbook.add_worksheet(form);
    workbook.add_worksheet(notes);
    workbook
}

/// Write an in-memory workbook as an xlsx file.
///
/// Dates get a `yyyy/mm/dd` number format. On the form sheet the title in B1
/// is merged across B1:J1 and the columns are widened, like the real template.
#[allow(dead_code)]
pub fn workbook_to_xlsx(template: &TemplateWorkbook) -> Vec<u8> {
    let date_format = Format::new().set_num_format("yyyy/mm/dd");
    let mut workbook = Workbook::new();

    for name in template.sheet_names() {
        let sheet = template.worksheet(name).unwrap();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name).unwrap();
        let is_form = name == FORM_SHEET_NAME;

        for (row, column, value) in sheet.cells() {
            let (row, column) = (row - 1, column - 1);
            if is_form && (row, column) == (0, 1) {
                if let CellValue::String(title) = value {
                    worksheet
                        .merge_range(0, 1, 0, 9, title, &Format::new())
                        .unwrap();
                    continue;
                }
            }
            match value {
                CellValue::String(text) => worksheet.write_string(row, column, text),
                CellValue::Number(number) => worksheet.write_number(row, column, *number),
                CellValue::Bool(flag) => worksheet.write_boolean(row, column, *flag),
                CellValue::DateTime(serial) => {
                    worksheet.write_number_with_format(row, column, *serial, &date_format)
                }
                CellValue::Formula(formula) => {
                    worksheet.write_formula(row, column, Formula::new(formula))
                }
            }
            .unwrap();
        }

        if is_form {
            worksheet.set_column_width(1, 16).unwrap();
            worksheet.set_column_width(2, 28).unwrap();
        }
    }

    workbook.save_to_buffer().unwrap()
}

/// [`create_template_workbook`] as xlsx bytes.
#[allow(dead_code)]
pub fn create_template_xlsx() -> Vec<u8> {
    workbook_to_xlsx(&create_template_workbook())
}
