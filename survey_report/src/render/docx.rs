//! Office Open XML (`.docx`) export.
//!
//! The body is assembled as WordprocessingML and packed with the minimal set of parts a
//! word processor needs: content types, the package relationships, the document, its
//! styles and the relationship from the document to the styles.

use std::io::{Cursor, Write};

use log::debug;
use snafu::prelude::*;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::{ArchiveSnafu, WriteSnafu};
use crate::render::{printable, RenderResult, Renderer};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/><w:sz w:val="22"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="120" w:line="276" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:jc w:val="center"/><w:spacing w:after="360"/></w:pPr><w:rPr><w:b/><w:sz w:val="48"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="200" w:after="80"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:sz w:val="26"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:outlineLvl w:val="2"/></w:pPr><w:rPr><w:b/><w:i/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="BodyText"><w:name w:val="Body Text"/><w:basedOn w:val="Normal"/><w:qFormat/><w:pPr><w:jc w:val="both"/></w:pPr></w:style><w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="000000"/><w:left w:val="single" w:sz="4" w:space="0" w:color="000000"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="000000"/><w:right w:val="single" w:sz="4" w:space="0" w:color="000000"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="000000"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="000000"/></w:tblBorders></w:tblPr></w:style></w:styles>"#;

// A4 portrait, 2.54cm margins.
const SECTION: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr>"#;

const BORDERS: &str = r#"<w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="000000"/><w:left w:val="single" w:sz="4" w:space="0" w:color="000000"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="000000"/><w:right w:val="single" w:sz="4" w:space="0" w:color="000000"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="000000"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="000000"/></w:tblBorders>"#;

fn escape_xml(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    for c in printable(s).chars() {
        match c {
            '&' => res.push_str("&amp;"),
            '<' => res.push_str("&lt;"),
            '>' => res.push_str("&gt;"),
            '"' => res.push_str("&quot;"),
            '\'' => res.push_str("&apos;"),
            c => res.push(c),
        }
    }
    res
}

fn run(text: &str, bold: bool) -> String {
    let props = if bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
    format!(
        "<w:r>{}<w:t xml:space=\"preserve\">{}</w:t></w:r>",
        props,
        escape_xml(text)
    )
}

fn styled_paragraph(style: &str, text: &str) -> String {
    format!(
        "<w:p><w:pPr><w:pStyle w:val=\"{}\"/></w:pPr>{}</w:p>",
        style,
        run(text, false)
    )
}

/// Accumulates the document body.
#[derive(Debug, Default)]
pub struct DocxRenderer {
    body: String,
}

impl DocxRenderer {
    pub fn new() -> DocxRenderer {
        DocxRenderer::default()
    }

    fn document_xml(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:document xmlns:w=\"{}\"><w:body>{}{}</w:body></w:document>",
            W_NS, self.body, SECTION
        )
    }
}

impl Renderer for DocxRenderer {
    type Output = Vec<u8>;

    fn title(&mut self, text: &str) -> RenderResult<()> {
        self.body.push_str(&styled_paragraph("Title", text));
        Ok(())
    }

    fn chapter_break(&mut self) -> RenderResult<()> {
        self.body
            .push_str("<w:p><w:r><w:br w:type=\"page\"/></w:r></w:p>");
        Ok(())
    }

    fn heading(&mut self, level: u8, text: &str) -> RenderResult<()> {
        let style = format!("Heading{}", level.clamp(1, 3));
        self.body.push_str(&styled_paragraph(&style, text));
        Ok(())
    }

    fn table(&mut self, rows: &[Vec<String>]) -> RenderResult<()> {
        let num_cols = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut xml = String::new();
        xml.push_str("<w:tbl>");
        xml.push_str("<w:tblPr><w:tblStyle w:val=\"TableGrid\"/><w:tblW w:w=\"0\" w:type=\"auto\"/>");
        xml.push_str(BORDERS);
        xml.push_str("</w:tblPr><w:tblGrid>");
        for _ in 0..num_cols {
            xml.push_str("<w:gridCol/>");
        }
        xml.push_str("</w:tblGrid>");
        for (idx, row) in rows.iter().enumerate() {
            xml.push_str("<w:tr>");
            for col in 0..num_cols {
                let text = row.get(col).map(|s| s.as_str()).unwrap_or("");
                // The header row and the row labels are in bold.
                let bold = idx == 0 || col == 0;
                xml.push_str("<w:tc><w:tcPr><w:tcW w:w=\"0\" w:type=\"auto\"/></w:tcPr><w:p>");
                xml.push_str(&run(text, bold));
                xml.push_str("</w:p></w:tc>");
            }
            xml.push_str("</w:tr>");
        }
        xml.push_str("</w:tbl>");
        // Spacing after the table.
        xml.push_str("<w:p></w:p>");
        debug!("DocxRenderer: table {}x{}", rows.len(), num_cols);
        self.body.push_str(&xml);
        Ok(())
    }

    fn paragraph(&mut self, text: &str) -> RenderResult<()> {
        self.body.push_str(&styled_paragraph("BodyText", text));
        Ok(())
    }

    fn finish(self) -> RenderResult<Vec<u8>> {
        let document = self.document_xml();
        let parts: [(&str, &str); 5] = [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", PACKAGE_RELS),
            ("word/document.xml", document.as_str()),
            ("word/styles.xml", STYLES),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS),
        ];
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in parts {
            zip.start_file(name, options).context(ArchiveSnafu)?;
            zip.write_all(content.as_bytes()).context(WriteSnafu)?;
        }
        let cursor = zip.finish().context(ArchiveSnafu)?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn forbidden_control_characters_are_dropped() {
        assert_eq!(escape_xml("bad\u{1}value\u{b}"), "badvalue");
        assert_eq!(escape_xml("a\tb"), "a\tb");

        let mut r = DocxRenderer::new();
        r.table(&[vec!["bad\u{1}value\u{b}".to_string()]]).unwrap();
        r.paragraph("end\u{1f}\u{FFFF}").unwrap();
        assert!(r.body.contains(">badvalue</w:t>"));
        assert!(r.body.contains(">end</w:t>"));
        assert!(!r.body.chars().any(|c| c < '\u{20}'));
    }

    #[test]
    fn headings_are_clamped_to_known_styles() {
        let mut r = DocxRenderer::new();
        r.heading(5, "Deep").unwrap();
        assert!(r.body.contains("w:val=\"Heading3\""));
    }

    #[test]
    fn ragged_rows_are_padded() {
        let mut r = DocxRenderer::new();
        r.table(&[
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string()],
        ])
        .unwrap();
        assert_eq!(r.body.matches("<w:tc>").count(), 4);
        assert_eq!(r.body.matches("<w:gridCol/>").count(), 2);
    }
}
