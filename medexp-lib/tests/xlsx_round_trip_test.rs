//! Tests for filling an actual xlsx template file

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use calamine::{Data, Reader, Xlsx};
use medexp_lib::{CellValue, FORM_SHEET_NAME, TemplateWorkbook, WorkbookError, WorkbookProjector};
use tempfile::tempdir;

mod common;

fn sample_entries() -> Vec<medexp_lib::Entry> {
    vec![
        common::create_valid_entry("山田太郎", "山田クリニック", 5000.0, Some((2023, 6, 1))),
        common::create_valid_entry("山田花子", "駅前薬局", 1200.0, Some((2023, 2, 3))),
    ]
}

/// Every part of an xlsx package, uncompressed.
fn package_parts(bytes: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut parts = BTreeMap::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).unwrap();
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        parts.insert(file.name().to_string(), content);
    }
    parts
}

fn open_xlsx(bytes: &[u8]) -> Xlsx<Cursor<Vec<u8>>> {
    Xlsx::new(Cursor::new(bytes.to_vec())).unwrap()
}

#[test]
fn test_filled_form_keeps_merged_cells_and_date_cells() {
    let template = common::create_template_xlsx();
    let mut before = open_xlsx(&template);
    before.load_merged_regions().unwrap();
    assert_eq!(before.merged_regions_by_sheet(FORM_SHEET_NAME).len(), 1);

    let filled = WorkbookProjector::default()
        .project_xlsx(&sample_entries(), &template)
        .unwrap();

    let mut after = open_xlsx(&filled);
    after.load_merged_regions().unwrap();
    assert_eq!(after.merged_regions_by_sheet(FORM_SHEET_NAME).len(), 1);

    let range = after.worksheet_range(FORM_SHEET_NAME).unwrap();
    assert!(matches!(range.get_value((7, 9)), Some(Data::DateTime(_))));
    assert_eq!(
        range.get_value((8, 1)),
        Some(&Data::String("山田花子".to_string()))
    );
}

#[test]
fn test_only_the_form_sheet_part_changes() {
    let template = common::create_template_xlsx();
    let filled = WorkbookProjector::default()
        .project_xlsx(&sample_entries(), &template)
        .unwrap();

    let before = package_parts(&template);
    let after = package_parts(&filled);
    assert_eq!(
        before.keys().collect::<Vec<_>>(),
        after.keys().collect::<Vec<_>>()
    );
    let changed: Vec<&String> = before
        .iter()
        .filter(|(name, content)| after[*name] != **content)
        .map(|(name, _)| name)
        .collect();
    assert_eq!(changed.len(), 1);
    assert!(changed[0].starts_with("xl/worksheets/"));
}

#[test]
fn test_filled_form_reads_back_like_the_projection() {
    let template_bytes = common::create_template_xlsx();
    let template = TemplateWorkbook::from_xlsx_bytes(&template_bytes).unwrap();
    let projector = WorkbookProjector::default();

    let projected = projector.project(&sample_entries(), &template).unwrap();
    let filled = projector
        .project_xlsx(&sample_entries(), &template_bytes)
        .unwrap();
    let reread = TemplateWorkbook::from_xlsx_bytes(&filled).unwrap();

    assert_eq!(reread.sheet_names(), template.sheet_names());
    assert_eq!(common::form_row(&reread, 9), common::form_row(&projected, 9));
    assert_eq!(common::form_row(&reread, 10), common::form_row(&projected, 10));
    assert_eq!(
        common::form_row(&reread, 9),
        vec![
            "山田花子",
            "駅前薬局",
            "該当する",
            "",
            "",
            "",
            "1200",
            "0",
            "2023/02/03"
        ]
    );

    let form = reread.worksheet(FORM_SHEET_NAME).unwrap();
    assert_eq!(
        form.cell(5, 8),
        Some(&CellValue::Formula("SUM(H9:H1008)".to_string()))
    );
    assert_eq!(form.cell(8, 10), Some(&CellValue::DateTime(44927.0)));
    assert_eq!(
        reread.worksheet("notes").unwrap(),
        template.worksheet("notes").unwrap()
    );
}

#[test]
fn test_filling_twice_gives_the_same_file() {
    let template = common::create_template_xlsx();
    let projector = WorkbookProjector::default();
    let first = projector.project_xlsx(&sample_entries(), &template).unwrap();
    let second = projector.project_xlsx(&sample_entries(), &template).unwrap();
    assert_eq!(package_parts(&first), package_parts(&second));
}

#[test]
fn test_template_without_form_sheet_is_rejected() {
    let mut wrong = TemplateWorkbook::new();
    wrong.add_worksheet(medexp_lib::Worksheet::new("Sheet1"));
    let bytes = common::workbook_to_xlsx(&wrong);

    let result = WorkbookProjector::default().project_xlsx(&sample_entries(), &bytes);
    assert!(matches!(result, Err(WorkbookError::WorksheetNotFound(_))));
}

#[test]
fn test_template_loads_from_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("template.xlsx");
    std::fs::write(&path, common::create_template_xlsx()).unwrap();

    let loaded = TemplateWorkbook::from_xlsx_path(&path).unwrap();
    assert_eq!(
        loaded.worksheet("notes").unwrap().cell(9, 2),
        Some(&CellValue::String("untouched".to_string()))
    );
    assert_eq!(
        loaded.worksheet(FORM_SHEET_NAME).unwrap().cell(1, 2).and_then(CellValue::as_str),
        Some("医療費集計フォーム")
    );
}
