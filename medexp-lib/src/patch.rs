//! In-place cell edits on an xlsx package.
//!
//! The filled form has to stay the tax office's file: merged header cells,
//! column widths, number formats, validation and protection all live in parts
//! this module never touches. Only the worksheet XML of the edited sheet is
//! rewritten, and only the `<c>` elements being edited change; every other zip
//! entry is copied through as raw compressed bytes.

use std::collections::BTreeMap;
use std::io::{BufRead, Cursor, Read, Write};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::workbook::{CellValue, WorkbookError, Worksheet};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

#[derive(Debug, Clone, PartialEq)]
pub enum CellPatch {
    /// Remove the value (and formula) but keep the cell's style.
    Clear,
    Set(CellValue),
}

/// Edits to one worksheet, keyed by 1-based (row, column).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetPatches {
    cells: BTreeMap<(u32, u16), CellPatch>,
}

impl SheetPatches {
    pub fn new() -> Self {
        SheetPatches::default()
    }

    pub fn set(&mut self, row: u32, column: u16, value: CellValue) {
        self.cells.insert((row, column), CellPatch::Set(value));
    }

    pub fn clear(&mut self, row: u32, column: u16) {
        self.cells.insert((row, column), CellPatch::Clear);
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Apply the same edits to the in-memory model of the sheet.
    pub fn apply_to(&self, worksheet: &mut Worksheet) {
        for (&(row, column), patch) in &self.cells {
            match patch {
                CellPatch::Set(value) => worksheet.set_cell(row, column, value.clone()),
                CellPatch::Clear => worksheet.clear_cell(row, column),
            }
        }
    }

    fn by_row(&self) -> BTreeMap<u32, Vec<(u16, &CellPatch)>> {
        let mut rows: BTreeMap<u32, Vec<(u16, &CellPatch)>> = BTreeMap::new();
        for (&(row, column), patch) in &self.cells {
            rows.entry(row).or_default().push((column, patch));
        }
        rows
    }
}

/// Return a copy of the xlsx package `template` with `patches` applied to the
/// worksheet named `sheet_name`.
pub fn patch_xlsx(
    template: &[u8],
    sheet_name: &str,
    patches: &SheetPatches,
) -> Result<Vec<u8>, WorkbookError> {
    let mut archive = ZipArchive::new(Cursor::new(template))?;

    let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?;
    let relationship_id = find_sheet_relationship(&workbook_xml, sheet_name)?
        .ok_or_else(|| WorkbookError::WorksheetNotFound(sheet_name.to_string()))?;
    let rels_xml = read_part(&mut archive, WORKBOOK_RELS_PART)?;
    let sheet_part = find_relationship_target(&rels_xml, &relationship_id)?
        .map(|target| resolve_target("xl", &target))
        .ok_or_else(|| {
            WorkbookError::InvalidTemplate(format!(
                "No worksheet part for {sheet_name} ({relationship_id})"
            ))
        })?;

    let original = read_part(&mut archive, &sheet_part)?;
    let patched = patch_worksheet_xml(&original, patches)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(template.len())));
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
    for index in 0..archive.len() {
        let file = archive.by_index_raw(index)?;
        if file.name() == sheet_part {
            writer.start_file(sheet_part.as_str(), options)?;
            writer.write_all(&patched)?;
        } else {
            writer.raw_copy_file(file)?;
        }
    }

    Ok(writer.finish()?.into_inner())
}

fn read_part<R: std::io::Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Vec<u8>, WorkbookError> {
    let mut file = archive.by_name(name)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// The `r:id` of the `<sheet>` named `sheet_name` in `xl/workbook.xml`.
fn find_sheet_relationship(
    workbook_xml: &[u8],
    sheet_name: &str,
) -> Result<Option<String>, WorkbookError> {
    let mut reader = Reader::from_reader(workbook_xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                if attribute(&e, b"name")?.as_deref() == Some(sheet_name) {
                    return attribute(&e, b"id");
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn find_relationship_target(
    rels_xml: &[u8],
    relationship_id: &str,
) -> Result<Option<String>, WorkbookError> {
    let mut reader = Reader::from_reader(rels_xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attribute(&e, b"Id")?.as_deref() == Some(relationship_id) {
                    let external = attribute(&e, b"TargetMode")?
                        .is_some_and(|mode| mode.eq_ignore_ascii_case("External"));
                    if external {
                        return Ok(None);
                    }
                    return attribute(&e, b"Target");
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

/// Part name of a relationship target, relative to `base_dir` unless absolute.
fn resolve_target(base_dir: &str, target: &str) -> String {
    let (target, mut segments) = match target.strip_prefix('/') {
        Some(absolute) => (absolute, Vec::new()),
        None => (target, base_dir.split('/').filter(|s| !s.is_empty()).collect()),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    segments.join("/")
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, WorkbookError> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Rewrite the `<sheetData>` of a worksheet part. Rows and cells that are not
/// patched are written back event for event.
fn patch_worksheet_xml(
    original: &[u8],
    patches: &SheetPatches,
) -> Result<Vec<u8>, WorkbookError> {
    let rows = patches.by_row();
    let mut reader = Reader::from_reader(original);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(original.len() + rows.len() * 512));

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                writer.write_event(Event::Start(e.into_owned()))?;
                patch_sheet_data(&mut reader, &mut writer, &rows)?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" && !rows.is_empty() => {
                writer.write_event(Event::Start(e.into_owned()))?;
                for (&row, cells) in &rows {
                    write_new_row(&mut writer, row, cells)?;
                }
                writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
            }
            Event::Eof => break,
            event => writer.write_event(event.into_owned())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn patch_sheet_data<R: BufRead>(
    reader: &mut Reader<R>,
    writer: &mut Writer<Vec<u8>>,
    rows: &BTreeMap<u32, Vec<(u16, &CellPatch)>>,
) -> Result<(), WorkbookError> {
    let mut pending = rows.iter().peekable();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let row_start = e.into_owned();
                let Some(row) = attribute(&row_start, b"r")?.and_then(|r| r.parse::<u32>().ok())
                else {
                    writer.write_event(Event::Start(row_start))?;
                    continue;
                };
                while let Some((&new_row, cells)) = pending.next_if(|(r, _)| **r < row) {
                    write_new_row(writer, new_row, cells)?;
                }
                writer.write_event(Event::Start(row_start))?;
                if let Some((_, cells)) = pending.next_if(|(r, _)| **r == row) {
                    patch_row(reader, writer, row, cells)?;
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let row_empty = e.into_owned();
                let Some(row) = attribute(&row_empty, b"r")?.and_then(|r| r.parse::<u32>().ok())
                else {
                    writer.write_event(Event::Empty(row_empty))?;
                    continue;
                };
                while let Some((&new_row, cells)) = pending.next_if(|(r, _)| **r < row) {
                    write_new_row(writer, new_row, cells)?;
                }
                match pending.next_if(|(r, _)| **r == row) {
                    // `<row/>` becomes `<row>...</row>`, keeping its attributes
                    Some((_, cells)) => {
                        writer.write_event(Event::Start(row_empty))?;
                        for (column, patch) in cells {
                            write_cell(writer, row, *column, patch, None)?;
                        }
                        writer.write_event(Event::End(BytesEnd::new("row")))?;
                    }
                    None => writer.write_event(Event::Empty(row_empty))?,
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                for (&new_row, cells) in pending.by_ref() {
                    write_new_row(writer, new_row, cells)?;
                }
                writer.write_event(Event::End(e.into_owned()))?;
                return Ok(());
            }
            Event::Eof => {
                return Err(WorkbookError::InvalidTemplate(
                    "Unexpected end of worksheet inside sheetData".to_string(),
                ));
            }
            event => writer.write_event(event.into_owned())?,
        }
        buf.clear();
    }
}

/// Patch the cells of one existing row. The row start tag is already written;
/// this writes everything up to and including the row end tag.
fn patch_row<R: BufRead>(
    reader: &mut Reader<R>,
    writer: &mut Writer<Vec<u8>>,
    row: u32,
    cells: &[(u16, &CellPatch)],
) -> Result<(), WorkbookError> {
    let mut pending = cells.iter().peekable();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let (cell, is_empty) = match event {
            Event::Start(e) if e.local_name().as_ref() == b"c" => (e.into_owned(), false),
            Event::Empty(e) if e.local_name().as_ref() == b"c" => (e.into_owned(), true),
            Event::End(e) if e.local_name().as_ref() == b"row" => {
                for (column, patch) in pending.by_ref() {
                    write_cell(writer, row, *column, patch, None)?;
                }
                writer.write_event(Event::End(e.into_owned()))?;
                return Ok(());
            }
            Event::Eof => {
                return Err(WorkbookError::InvalidTemplate(format!(
                    "Unexpected end of worksheet inside row {row}"
                )));
            }
            event => {
                writer.write_event(event.into_owned())?;
                buf.clear();
                continue;
            }
        };
        buf.clear();

        let column = attribute(&cell, b"r")?
            .and_then(|reference| parse_cell_reference(&reference))
            .filter(|&(cell_row, _)| cell_row == row)
            .map(|(_, column)| column);
        let Some(column) = column else {
            writer.write_event(if is_empty {
                Event::Empty(cell)
            } else {
                Event::Start(cell)
            })?;
            continue;
        };

        while let Some((new_column, patch)) = pending.next_if(|(c, _)| *c < column) {
            write_cell(writer, row, *new_column, patch, None)?;
        }
        match pending.next_if(|(c, _)| *c == column) {
            Some((_, patch)) => {
                if !is_empty {
                    skip_element(reader, b"c")?;
                }
                let style = attribute(&cell, b"s")?;
                write_cell(writer, row, column, patch, style.as_deref())?;
            }
            None => writer.write_event(if is_empty {
                Event::Empty(cell)
            } else {
                Event::Start(cell)
            })?,
        }
    }
}

/// Consume events up to the end tag closing an element whose start was just read.
fn skip_element<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<(), WorkbookError> {
    let mut buf = Vec::new();
    let mut depth = 1usize;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(e) => {
                depth -= 1;
                if depth == 0 && e.local_name().as_ref() == name {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(WorkbookError::InvalidTemplate(
                    "Unexpected end of worksheet inside a cell".to_string(),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
}

fn write_new_row(
    writer: &mut Writer<Vec<u8>>,
    row: u32,
    cells: &[(u16, &CellPatch)],
) -> Result<(), WorkbookError> {
    let mut start = BytesStart::new("row");
    start.push_attribute(("r", row.to_string().as_str()));
    writer.write_event(Event::Start(start))?;
    for (column, patch) in cells {
        write_cell(writer, row, *column, patch, None)?;
    }
    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

/// Write one `<c>` element. `style` is the `s` attribute of the cell being
/// replaced, so number formats and borders of the template survive.
fn write_cell(
    writer: &mut Writer<Vec<u8>>,
    row: u32,
    column: u16,
    patch: &CellPatch,
    style: Option<&str>,
) -> Result<(), WorkbookError> {
    let reference = cell_reference(row, column);
    let mut start = BytesStart::new("c");
    start.push_attribute(("r", reference.as_str()));
    if let Some(style) = style {
        start.push_attribute(("s", style));
    }

    let value = match patch {
        CellPatch::Set(value) => value,
        CellPatch::Clear => {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
    };

    match value {
        CellValue::String(text) => {
            start.push_attribute(("t", "inlineStr"));
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Start(BytesStart::new("is")))?;
            let mut t = BytesStart::new("t");
            if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
                t.push_attribute(("xml:space", "preserve"));
            }
            writer.write_event(Event::Start(t))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(BytesEnd::new("t")))?;
            writer.write_event(Event::End(BytesEnd::new("is")))?;
        }
        CellValue::Number(number) | CellValue::DateTime(number) => {
            if !number.is_finite() {
                writer.write_event(Event::Empty(start))?;
                return Ok(());
            }
            writer.write_event(Event::Start(start))?;
            write_text_element(writer, "v", &number.to_string())?;
        }
        CellValue::Bool(flag) => {
            start.push_attribute(("t", "b"));
            writer.write_event(Event::Start(start))?;
            write_text_element(writer, "v", if *flag { "1" } else { "0" })?;
        }
        CellValue::Formula(formula) => {
            writer.write_event(Event::Start(start))?;
            write_text_element(writer, "f", formula)?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), WorkbookError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// `A1`-style reference of a 1-based cell position.
fn cell_reference(row: u32, column: u16) -> String {
    let mut letters = Vec::new();
    let mut remaining = u32::from(column);
    while remaining > 0 {
        let digit = (remaining - 1) % 26;
        letters.push(char::from(b'A' + digit as u8));
        remaining = (remaining - 1) / 26;
    }
    letters.reverse();
    format!("{}{}", letters.into_iter().collect::<String>(), row)
}

/// 1-based (row, column) of an `A1`-style reference; `$` anchors are ignored.
fn parse_cell_reference(reference: &str) -> Option<(u32, u16)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut column: u32 = 0;
    for letter in letters.chars() {
        let value = u32::from(letter.to_ascii_uppercase()) - u32::from('A') + 1;
        column = column.checked_mul(26)?.checked_add(value)?;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row, u16::try_from(column).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet_xml(sheet_data: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="B1:J8"/><cols><col min="2" max="2" width="20" customWidth="1"/></cols>{sheet_data}<mergeCells count="1"><mergeCell ref="B1:J1"/></mergeCells></worksheet>"#
        )
    }

    fn patch_str(xml: &str, patches: &SheetPatches) -> String {
        String::from_utf8(patch_worksheet_xml(xml.as_bytes(), patches).unwrap()).unwrap()
    }

    #[test]
    fn test_cell_reference_conversions() {
        assert_eq!(cell_reference(9, 2), "B9");
        assert_eq!(cell_reference(1, 26), "Z1");
        assert_eq!(cell_reference(3, 27), "AA3");
        assert_eq!(parse_cell_reference("J10"), Some((10, 10)));
        assert_eq!(parse_cell_reference("$AA$3"), Some((3, 27)));
        assert_eq!(parse_cell_reference("A0"), None);
        assert_eq!(parse_cell_reference("12"), None);
    }

    #[test]
    fn test_resolve_target() {
        let expected = "xl/worksheets/sheet2.xml";
        assert_eq!(resolve_target("xl", "worksheets/sheet2.xml"), expected);
        assert_eq!(resolve_target("xl", "/xl/worksheets/sheet2.xml"), expected);
        assert_eq!(resolve_target("xl", "../xl/./sheet.xml"), "xl/sheet.xml");
    }

    #[test]
    fn test_patch_keeps_everything_outside_sheet_data() {
        let xml = sheet_xml(
            r#"<sheetData><row r="1"><c r="B1" s="3" t="s"><v>0</v></c></row></sheetData>"#,
        );
        let mut patches = SheetPatches::new();
        patches.set(9, 2, CellValue::String("Taro".to_string()));

        let patched = patch_str(&xml, &patches);
        assert!(patched.contains(r#"<mergeCells count="1"><mergeCell ref="B1:J1"/></mergeCells>"#));
        assert!(patched.contains(r#"<col min="2" max="2" width="20" customWidth="1"/>"#));
        assert!(patched.contains(r#"<c r="B1" s="3" t="s"><v>0</v></c>"#));
        assert!(patched.contains(
            r#"<row r="9"><c r="B9" t="inlineStr"><is><t>Taro</t></is></c></row></sheetData>"#
        ));
    }

    #[test]
    fn test_patch_replaces_cells_in_existing_row_keeping_style() {
        let xml = sheet_xml(
            r#"<sheetData><row r="9" spans="2:10"><c r="B9" s="5"/><c r="H9" s="6"><v>1</v></c><c r="J9" s="7" t="s"><v>4</v></c></row></sheetData>"#,
        );
        let mut patches = SheetPatches::new();
        patches.set(9, 2, CellValue::String("Taro".to_string()));
        patches.set(9, 4, CellValue::String("該当する".to_string()));
        patches.set(9, 8, CellValue::Number(5000.0));
        patches.clear(9, 10);

        let patched = patch_str(&xml, &patches);
        assert!(patched.contains(
            r#"<row r="9" spans="2:10"><c r="B9" s="5" t="inlineStr"><is><t>Taro</t></is></c><c r="D9" t="inlineStr"><is><t>該当する</t></is></c><c r="H9" s="6"><v>5000</v></c><c r="J9" s="7"/></row>"#
        ));
    }

    #[test]
    fn test_patch_inserts_rows_in_order() {
        let xml = sheet_xml(
            r#"<sheetData><row r="8"><c r="B8"><v>1</v></c></row><row r="11"/><row r="20"><c r="B20"><v>2</v></c></row></sheetData>"#,
        );
        let mut patches = SheetPatches::new();
        patches.set(9, 8, CellValue::Number(1.5));
        patches.set(10, 8, CellValue::Number(2.0));
        patches.set(11, 8, CellValue::Number(3.0));
        patches.set(21, 8, CellValue::Number(4.0));

        let patched = patch_str(&xml, &patches);
        let order: Vec<usize> = [
            r#"<row r="8">"#,
            r#"<row r="9"><c r="H9"><v>1.5</v></c></row>"#,
            r#"<row r="10"><c r="H10"><v>2</v></c></row>"#,
            r#"<row r="11"><c r="H11"><v>3</v></c></row>"#,
            r#"<row r="20">"#,
            r#"<row r="21"><c r="H21"><v>4</v></c></row>"#,
        ]
        .iter()
        .map(|fragment| patched.find(fragment).unwrap())
        .collect();
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_patch_fills_empty_sheet_data_and_escapes_text() {
        let xml = sheet_xml("<sheetData/>");
        let mut patches = SheetPatches::new();
        patches.set(9, 3, CellValue::String("A&B <clinic> ".to_string()));

        let patched = patch_str(&xml, &patches);
        assert!(patched.contains(
            r#"<sheetData><row r="9"><c r="C9" t="inlineStr"><is><t xml:space="preserve">A&amp;B &lt;clinic&gt; </t></is></c></row></sheetData>"#
        ));
    }

    #[test]
    fn test_patch_without_edits_is_identity() {
        let xml = sheet_xml(
            r#"<sheetData><row r="1"><c r="B1" t="s"><v>0</v></c></row></sheetData>"#,
        );
        assert_eq!(patch_str(&xml, &SheetPatches::new()), xml);
    }

    #[test]
    fn test_patch_rejects_truncated_sheet() {
        let xml = r#"<worksheet><sheetData><row r="9"><c r="B9"><v>1</v>"#;
        let mut patches = SheetPatches::new();
        patches.set(9, 2, CellValue::Number(2.0));
        assert!(patch_worksheet_xml(xml.as_bytes(), &patches).is_err());
    }

    #[test]
    fn test_apply_to_matches_worksheet_edits() {
        let mut worksheet = Worksheet::new("Data");
        worksheet.set_cell(9, 5, CellValue::String("stale".to_string()));
        let mut patches = SheetPatches::new();
        patches.set(9, 2, CellValue::String("Taro".to_string()));
        patches.clear(9, 5);

        patches.apply_to(&mut worksheet);
        assert_eq!(worksheet.cell(9, 2).and_then(CellValue::as_str), Some("Taro"));
        assert_eq!(worksheet.cell(9, 5), None);
        assert_eq!(worksheet.cells().count(), 1);
    }
}
