//! A small in-memory workbook: named sheets of sparse cell values.

use std::collections::BTreeMap;

use crate::error::WorkbookError;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a worksheet name (Excel limit)
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Value stored in a cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    String(String),
    Boolean(bool),
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        CellValue::Number(f64::from(v))
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Boolean(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::String(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::String(v)
    }
}

/// A single worksheet
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    cells: BTreeMap<(u32, u16), CellValue>,
}

impl Worksheet {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set a cell by zero-based row and column. Setting `Empty` clears it.
    pub fn set_cell(
        &mut self,
        row: u32,
        col: u16,
        value: impl Into<CellValue>,
    ) -> Result<(), WorkbookError> {
        if row >= MAX_ROWS {
            return Err(WorkbookError::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(WorkbookError::ColumnOutOfBounds(col, MAX_COLS - 1));
        }
        match value.into() {
            CellValue::Empty => {
                self.cells.remove(&(row, col));
            }
            value => {
                self.cells.insert((row, col), value);
            }
        }
        Ok(())
    }

    pub fn cell(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    /// Non-empty cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &CellValue)> {
        self.cells.iter().map(|(&(row, col), value)| (row, col, value))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// A1-style reference of the used range, if any cell is set.
    pub fn dimension(&self) -> Option<String> {
        let (first_row, _) = *self.cells.keys().next()?;
        let (last_row, _) = *self.cells.keys().next_back()?;
        let min_col = self.cells.keys().map(|&(_, c)| c).min()?;
        let max_col = self.cells.keys().map(|&(_, c)| c).max()?;
        Some(format!(
            "{}:{}",
            cell_reference(first_row, min_col),
            cell_reference(last_row, max_col)
        ))
    }
}

/// A workbook (spreadsheet document)
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    worksheets: Vec<Worksheet>,
}

impl Workbook {
    /// Create an empty workbook with no worksheets
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a worksheet and return its index.
    pub fn add_worksheet(&mut self, name: &str) -> Result<usize, WorkbookError> {
        validate_sheet_name(name)?;
        if self
            .worksheets
            .iter()
            .any(|ws| ws.name.eq_ignore_ascii_case(name))
        {
            return Err(WorkbookError::DuplicateSheetName(name.to_string()));
        }
        self.worksheets.push(Worksheet::new(name));
        Ok(self.worksheets.len() - 1)
    }

    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }
}

fn validate_sheet_name(name: &str) -> Result<(), WorkbookError> {
    if name.is_empty() {
        return Err(WorkbookError::InvalidSheetName(
            "Sheet name cannot be empty".into(),
        ));
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(WorkbookError::InvalidSheetName(format!(
            "Sheet name too long (max {MAX_SHEET_NAME_LEN} characters)"
        )));
    }
    const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
    if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
        return Err(WorkbookError::InvalidSheetName(format!(
            "Sheet name cannot contain '{c}'"
        )));
    }
    Ok(())
}

/// Convert a column index to letters (0 = A, 25 = Z, 26 = AA)
pub fn column_to_letters(col: u16) -> String {
    let mut result = String::new();
    let mut n = u32::from(col) + 1;
    while n > 0 {
        n -= 1;
        result.insert(0, char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    result
}

/// A1-style reference for a zero-based row and column.
pub fn cell_reference(row: u32, col: u16) -> String {
    format!("{}{}", column_to_letters(col), row + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn column_letters() {
        assert_eq!(column_to_letters(0), "A");
        assert_eq!(column_to_letters(25), "Z");
        assert_eq!(column_to_letters(26), "AA");
        assert_eq!(column_to_letters(701), "ZZ");
        assert_eq!(column_to_letters(MAX_COLS - 1), "XFD");
    }

    #[test]
    fn cells_iterate_row_major() {
        let mut wb = Workbook::new();
        let idx = wb.add_worksheet("Report").unwrap();
        let sheet = wb.worksheet_mut(idx).unwrap();
        sheet.set_cell(1, 0, "b").unwrap();
        sheet.set_cell(0, 2, 3.5).unwrap();
        sheet.set_cell(0, 0, true).unwrap();

        let order: Vec<(u32, u16)> = sheet.iter_cells().map(|(r, c, _)| (r, c)).collect();
        assert_eq!(order, vec![(0, 0), (0, 2), (1, 0)]);
        assert_eq!(sheet.dimension().as_deref(), Some("A1:C2"));
    }

    #[test]
    fn setting_empty_clears_the_cell() {
        let mut wb = Workbook::new();
        wb.add_worksheet("Sheet1").unwrap();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell(0, 0, 1).unwrap();
        sheet.set_cell(0, 0, CellValue::Empty).unwrap();
        assert_eq!(sheet.cell_count(), 0);
        assert_eq!(sheet.dimension(), None);
    }

    #[test]
    fn sheet_names_are_validated() {
        let mut wb = Workbook::new();
        wb.add_worksheet("Data").unwrap();
        assert!(matches!(
            wb.add_worksheet("data"),
            Err(WorkbookError::DuplicateSheetName(_))
        ));
        assert!(matches!(
            wb.add_worksheet("a/b"),
            Err(WorkbookError::InvalidSheetName(_))
        ));
        assert!(matches!(
            wb.add_worksheet(""),
            Err(WorkbookError::InvalidSheetName(_))
        ));
        assert!(matches!(
            wb.add_worksheet(&"x".repeat(32)),
            Err(WorkbookError::InvalidSheetName(_))
        ));
    }

    #[test]
    fn out_of_bounds_cells_are_rejected() {
        let mut wb = Workbook::new();
        wb.add_worksheet("Sheet1").unwrap();
        let sheet = wb.worksheet_mut(0).unwrap();
        assert!(sheet.set_cell(MAX_ROWS, 0, 1).is_err());
        assert!(sheet.set_cell(0, MAX_COLS, 1).is_err());
    }
}
