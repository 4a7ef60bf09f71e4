use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, Xlsx};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("Worksheet with name {0} not found")]
    WorksheetNotFound(String),

    #[error("Error reading template workbook: {0}")]
    Read(#[from] calamine::XlsxError),

    #[error("Template is not a valid xlsx package: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("Malformed worksheet XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed worksheet XML attribute: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Workbook file error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Number(f64),
    Bool(bool),
    /// Excel serial number of a date-formatted cell.
    DateTime(f64),
    /// Formula text without the leading `=`.
    Formula(String),
}

impl CellValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// A named grid of cells. Rows and columns are 1-based, as in the Excel UI.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Worksheet {
    name: String,
    cells: BTreeMap<(u32, u16), CellValue>,
}

impl Worksheet {
    pub fn new(name: &str) -> Self {
        Worksheet {
            name: name.to_string(),
            cells: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell(&self, row: u32, column: u16) -> Option<&CellValue> {
        self.cells.get(&(row, column))
    }

    pub fn set_cell(&mut self, row: u32, column: u16, value: CellValue) {
        self.cells.insert((row, column), value);
    }

    pub fn clear_cell(&mut self, row: u32, column: u16) {
        self.cells.remove(&(row, column));
    }

    /// Non-empty cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u16, &CellValue)> {
        self.cells
            .iter()
            .map(|(&(row, column), value)| (row, column, value))
    }

    /// Non-empty cells of a single row, by column.
    pub fn row(&self, row: u32) -> impl Iterator<Item = (u16, &CellValue)> {
        self.cells
            .range((row, 0)..=(row, u16::MAX))
            .map(|(&(_, column), value)| (column, value))
    }
}

/// The template workbook: worksheets in file order, each addressable by name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemplateWorkbook {
    worksheets: Vec<Worksheet>,
}

impl TemplateWorkbook {
    pub fn new() -> Self {
        TemplateWorkbook::default()
    }

    pub fn add_worksheet(&mut self, worksheet: Worksheet) {
        self.worksheets.push(worksheet);
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.worksheets.iter().map(Worksheet::name).collect()
    }

    pub fn worksheet(&self, name: &str) -> Result<&Worksheet, WorkbookError> {
        self.worksheets
            .iter()
            .find(|worksheet| worksheet.name == name)
            .ok_or_else(|| WorkbookError::WorksheetNotFound(name.to_string()))
    }

    pub fn worksheet_mut(&mut self, name: &str) -> Result<&mut Worksheet, WorkbookError> {
        self.worksheets
            .iter_mut()
            .find(|worksheet| worksheet.name == name)
            .ok_or_else(|| WorkbookError::WorksheetNotFound(name.to_string()))
    }

    /// Read every worksheet of an xlsx file: cached values and formulas.
    pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Self, WorkbookError> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))?;
        let mut template = TemplateWorkbook::new();

        for sheet_name in workbook.sheet_names() {
            let mut worksheet = Worksheet::new(&sheet_name);

            let range = workbook.worksheet_range(&sheet_name)?;
            if let Some((start_row, start_column)) = range.start() {
                for (row, column, data) in range.used_cells() {
                    let Some(value) = Self::cell_value_from_data(data) else {
                        continue;
                    };
                    let position = Self::absolute_position(start_row, start_column, row, column);
                    if let Some((row, column)) = position {
                        worksheet.set_cell(row, column, value);
                    }
                }
            }

            // Formulas override the cached value read above
            if let Ok(formulas) = workbook.worksheet_formula(&sheet_name) {
                if let Some((start_row, start_column)) = formulas.start() {
                    for (row, column, formula) in formulas.used_cells() {
                        if formula.is_empty() {
                            continue;
                        }
                        let position =
                            Self::absolute_position(start_row, start_column, row, column);
                        if let Some((row, column)) = position {
                            worksheet.set_cell(row, column, CellValue::Formula(formula.clone()));
                        }
                    }
                }
            }

            template.add_worksheet(worksheet);
        }

        Ok(template)
    }

    pub fn from_xlsx_path<P: AsRef<Path>>(path: P) -> Result<Self, WorkbookError> {
        let bytes = std::fs::read(path)?;
        Self::from_xlsx_bytes(&bytes)
    }

    fn cell_value_from_data(data: &Data) -> Option<CellValue> {
        match data {
            Data::Empty | Data::Error(_) => None,
            Data::String(s) => Some(CellValue::String(s.clone())),
            Data::Float(f) => Some(CellValue::Number(*f)),
            Data::Int(i) => Some(CellValue::Number(*i as f64)),
            Data::Bool(b) => Some(CellValue::Bool(*b)),
            Data::DateTime(dt) => Some(CellValue::DateTime(dt.as_f64())),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::String(s.clone())),
        }
    }

    /// calamine ranges are 0-based and relative to their start cell.
    fn absolute_position(
        start_row: u32,
        start_column: u32,
        row: usize,
        column: usize,
    ) -> Option<(u32, u16)> {
        let row = start_row.checked_add(u32::try_from(row).ok()?)?.checked_add(1)?;
        let column = start_column.checked_add(u32::try_from(column).ok()?)?.checked_add(1)?;
        Some((row, u16::try_from(column).ok()?))
    }
}
