//! XLSX serializer for [`Workbook`].
//!
//! Writes the minimal SpreadsheetML package LibreOffice needs to open a
//! workbook: content types, relationships, the workbook part, a default
//! stylesheet and one part per worksheet. Strings are written inline so no
//! shared string table is needed.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::SerializeError;
use crate::serializer::SpreadsheetSerializer;
use crate::workbook::{cell_reference, CellValue, Workbook};

type XlsxResult<T> = std::result::Result<T, SerializeError>;

/// Escape text for an element or attribute.
///
/// XML 1.0 cannot carry C0 controls other than tab, newline and carriage
/// return, so they are written as SpreadsheetML `_xHHHH_` escapes. An
/// underscore that would otherwise read as such an escape becomes `_x005F_`.
fn xml_text(text: &str) -> Cow<'_, str> {
    let needs_encoding = |i: usize, c: char| {
        (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r'))
            || (c == '_' && looks_like_escape(&text[i..]))
    };
    if !text.char_indices().any(|(i, c)| needs_encoding(i, c)) {
        return escape(text);
    }

    let mut encoded = String::with_capacity(text.len() + 8);
    for (i, c) in text.char_indices() {
        if needs_encoding(i, c) {
            encoded.push_str(&format!("_x{:04X}_", u32::from(c)));
        } else {
            encoded.push(c);
        }
    }
    Cow::Owned(escape(&encoded).into_owned())
}

/// `_xHHHH_` at the start of `s`.
fn looks_like_escape(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 7
        && b[0] == b'_'
        && b[1] == b'x'
        && b[2..6].iter().all(u8::is_ascii_hexdigit)
        && b[6] == b'_'
}

/// Office Open XML spreadsheet writer
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxSerializer;

impl SpreadsheetSerializer<Workbook> for XlsxSerializer {
    fn file_extension(&self) -> &str {
        "xlsx"
    }

    fn serialize(&self, workbook: &Workbook, path: &Path) -> XlsxResult<()> {
        let file = File::create(path)?;
        Self::write(workbook, BufWriter::new(file))
    }
}

impl XlsxSerializer {
    /// Write a workbook to a writer
    pub fn write<W: Write + Seek>(workbook: &Workbook, writer: W) -> XlsxResult<()> {
        if workbook.sheet_count() == 0 {
            return Err(SerializeError::Unsupported(
                "a workbook needs at least one worksheet".into(),
            ));
        }

        let mut zip = ZipWriter::new(writer);

        Self::write_content_types(&mut zip, workbook)?;
        Self::write_root_rels(&mut zip)?;
        Self::write_workbook_xml(&mut zip, workbook)?;
        Self::write_workbook_rels(&mut zip, workbook)?;
        Self::write_styles_xml(&mut zip)?;
        for (i, _) in workbook.worksheets().enumerate() {
            Self::write_worksheet(&mut zip, workbook, i)?;
        }

        let mut inner = zip.finish()?;
        inner.flush()?;
        Ok(())
    }

    fn write_content_types<W: Write + Seek>(
        zip: &mut ZipWriter<W>,
        workbook: &Workbook,
    ) -> XlsxResult<()> {
        zip.start_file("[Content_Types].xml", SimpleFileOptions::default())?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
    <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
        );
        for i in 1..=workbook.sheet_count() {
            content.push_str(&format!(
                r#"
    <Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            ));
        }
        content.push_str("\n</Types>");

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_root_rels<W: Write + Seek>(zip: &mut ZipWriter<W>) -> XlsxResult<()> {
        zip.start_file("_rels/.rels", SimpleFileOptions::default())?;
        zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
        )?;
        Ok(())
    }

    fn write_workbook_xml<W: Write + Seek>(
        zip: &mut ZipWriter<W>,
        workbook: &Workbook,
    ) -> XlsxResult<()> {
        zip.start_file("xl/workbook.xml", SimpleFileOptions::default())?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
    <sheets>"#,
        );
        for (i, sheet) in workbook.worksheets().enumerate() {
            content.push_str(&format!(
                r#"
        <sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                xml_text(sheet.name()),
                i + 1,
                i + 1
            ));
        }
        content.push_str("\n    </sheets>\n</workbook>");

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_workbook_rels<W: Write + Seek>(
        zip: &mut ZipWriter<W>,
        workbook: &Workbook,
    ) -> XlsxResult<()> {
        zip.start_file("xl/_rels/workbook.xml.rels", SimpleFileOptions::default())?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        let count = workbook.sheet_count();
        for i in 1..=count {
            content.push_str(&format!(
                r#"
    <Relationship Id="rId{i}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{i}.xml"/>"#
            ));
        }
        // Styles come after the sheets so sheet N keeps rIdN.
        content.push_str(&format!(
            r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#,
            count + 1
        ));

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_styles_xml<W: Write + Seek>(zip: &mut ZipWriter<W>) -> XlsxResult<()> {
        zip.start_file("xl/styles.xml", SimpleFileOptions::default())?;
        zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
    <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
    <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
    <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
    <cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
    <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#,
        )?;
        Ok(())
    }

    fn write_worksheet<W: Write + Seek>(
        zip: &mut ZipWriter<W>,
        workbook: &Workbook,
        index: usize,
    ) -> XlsxResult<()> {
        let sheet = workbook
            .worksheet(index)
            .ok_or_else(|| SerializeError::Unsupported(format!("sheet {index} not found")))?;

        zip.start_file(
            format!("xl/worksheets/sheet{}.xml", index + 1),
            SimpleFileOptions::default(),
        )?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        );
        if let Some(dimension) = sheet.dimension() {
            content.push_str(&format!("\n    <dimension ref=\"{dimension}\"/>"));
        }
        content.push_str("\n    <sheetData>");

        let mut current_row: Option<u32> = None;
        for (row, col, value) in sheet.iter_cells() {
            if current_row != Some(row) {
                if current_row.is_some() {
                    content.push_str("\n        </row>");
                }
                content.push_str(&format!("\n        <row r=\"{}\">", row + 1));
                current_row = Some(row);
            }

            let cell_ref = cell_reference(row, col);
            match value {
                CellValue::Number(n) if n.is_finite() => {
                    content.push_str(&format!("\n            <c r=\"{cell_ref}\"><v>{n}</v></c>"));
                }
                CellValue::Number(n) => {
                    // NaN and infinities have no SpreadsheetML literal.
                    content.push_str(&format!(
                        "\n            <c r=\"{cell_ref}\" t=\"inlineStr\"><is><t>{n}</t></is></c>"
                    ));
                }
                CellValue::String(s) => {
                    content.push_str(&format!(
                        "\n            <c r=\"{cell_ref}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                        xml_text(s)
                    ));
                }
                CellValue::Boolean(b) => {
                    content.push_str(&format!(
                        "\n            <c r=\"{cell_ref}\" t=\"b\"><v>{}</v></c>",
                        u8::from(*b)
                    ));
                }
                CellValue::Empty => {}
            }
        }
        if current_row.is_some() {
            content.push_str("\n        </row>");
        }
        content.push_str("\n    </sheetData>\n</worksheet>");

        zip.write_all(content.as_bytes())?;
        Ok(())
    }
}
