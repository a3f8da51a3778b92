//! CSV file -> single-sheet [`Workbook`].

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use sheets_pdf::{CellValue, Workbook};

pub struct CsvOptions {
    pub delimiter: u8,
    pub sheet_name: String,
    /// Parse numbers and booleans instead of keeping every field as text.
    pub detect_types: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            sheet_name: "Sheet1".to_string(),
            detect_types: true,
        }
    }
}

pub fn read_csv_file(path: &Path, options: &CsvOptions) -> Result<Workbook> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open '{}'", path.display()))?;
    read_csv(file, options).with_context(|| format!("Failed to read CSV '{}'", path.display()))
}

pub fn read_csv<R: Read>(reader: R, options: &CsvOptions) -> Result<Workbook> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut workbook = Workbook::new();
    let idx = workbook.add_worksheet(&options.sheet_name)?;
    let sheet = workbook
        .worksheet_mut(idx)
        .context("worksheet vanished after insertion")?;

    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row = u32::try_from(row).context("too many rows")?;
        for (col, field) in record.iter().enumerate() {
            let col = u16::try_from(col).context("too many columns")?;
            let value = if options.detect_types {
                detect_type(field)
            } else if field.is_empty() {
                CellValue::Empty
            } else {
                CellValue::String(field.to_string())
            };
            sheet.set_cell(row, col, value)?;
        }
    }

    Ok(workbook)
}

fn detect_type(field: &str) -> CellValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return CellValue::Boolean(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return CellValue::Boolean(false);
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::String(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_rows_with_types() {
        let data = "Item,Qty,Paid\nPaper,12,true\nInk,2.5,FALSE\n";
        let wb = read_csv(data.as_bytes(), &CsvOptions::default()).unwrap();

        let sheet = wb.worksheet(0).unwrap();
        assert_eq!(sheet.name(), "Sheet1");
        assert_eq!(sheet.cell(0, 0), Some(&CellValue::from("Item")));
        assert_eq!(sheet.cell(1, 1), Some(&CellValue::Number(12.0)));
        assert_eq!(sheet.cell(1, 2), Some(&CellValue::Boolean(true)));
        assert_eq!(sheet.cell(2, 1), Some(&CellValue::Number(2.5)));
        assert_eq!(sheet.cell(2, 2), Some(&CellValue::Boolean(false)));
    }

    #[test]
    fn ragged_rows_and_empty_fields() {
        let data = "a;;c\nd\n";
        let options = CsvOptions {
            delimiter: b';',
            sheet_name: "Data".into(),
            detect_types: false,
        };
        let wb = read_csv(data.as_bytes(), &options).unwrap();

        let sheet = wb.worksheet(0).unwrap();
        assert_eq!(sheet.name(), "Data");
        assert_eq!(sheet.cell_count(), 3);
        assert_eq!(sheet.cell(0, 1), None);
        assert_eq!(sheet.cell(1, 0), Some(&CellValue::from("d")));
    }

    #[test]
    fn text_that_looks_odd_stays_text() {
        assert_eq!(detect_type("NaN"), CellValue::from("NaN"));
        assert_eq!(detect_type(" 007 "), CellValue::Number(7.0));
        assert_eq!(detect_type("12-04"), CellValue::from("12-04"));
    }
}
