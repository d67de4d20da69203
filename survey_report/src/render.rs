//! Serialization of compiled reports.
//!
//! Renderers never look at render nodes themselves: [`render_document`] walks the
//! nodes and calls the renderer for each of them, so that all the output formats carry
//! the same headings, cells and paragraphs. Only the presentation differs.

pub mod docx;
pub mod preview;

use log::debug;

use crate::config::{RenderError, RenderNode, ReportDocument};

pub use crate::render::docx::DocxRenderer;
pub use crate::render::preview::PreviewRenderer;

pub type RenderResult<T> = Result<T, RenderError>;

/// An output format for reports.
pub trait Renderer {
    type Output;

    fn title(&mut self, text: &str) -> RenderResult<()>;

    /// Called between two chapters.
    fn chapter_break(&mut self) -> RenderResult<()>;

    fn heading(&mut self, level: u8, text: &str) -> RenderResult<()>;

    /// The first row is the header. Never called with an empty table.
    fn table(&mut self, rows: &[Vec<String>]) -> RenderResult<()>;

    fn paragraph(&mut self, text: &str) -> RenderResult<()>;

    fn finish(self) -> RenderResult<Self::Output>;
}

/// Feeds a document to a renderer: the title first, then every node in order.
pub fn render_document<R: Renderer>(mut renderer: R, doc: &ReportDocument) -> RenderResult<R::Output> {
    renderer.title(&doc.title)?;
    let mut in_chapter = false;
    for node in doc.nodes.iter() {
        match node {
            RenderNode::Heading(1, text) => {
                if in_chapter {
                    renderer.chapter_break()?;
                }
                in_chapter = true;
                renderer.heading(1, text)?;
            }
            RenderNode::Heading(level, text) => renderer.heading(*level, text)?,
            RenderNode::Table(rows) if rows.is_empty() => {
                debug!("render_document: skipping empty table");
            }
            RenderNode::Table(rows) => renderer.table(rows)?,
            RenderNode::Paragraph(text) => renderer.paragraph(text)?,
        }
    }
    renderer.finish()
}

/// Removes the characters that XML 1.0 documents cannot carry: the control characters
/// other than tab, line feed and carriage return, and the U+FFFE and U+FFFF non-characters.
///
/// Both renderers apply it, so that they keep showing the same text.
pub fn printable(text: &str) -> String {
    text.chars()
        .filter(|c| match *c {
            '\t' | '\n' | '\r' => true,
            '\u{FFFE}' | '\u{FFFF}' => false,
            c => c >= '\u{20}',
        })
        .collect()
}

/// Renders the on-screen preview of a document.
pub fn preview(doc: &ReportDocument) -> RenderResult<String> {
    render_document(PreviewRenderer::new(), doc)
}

/// Serializes a document as a `.docx` file.
pub fn export_docx(doc: &ReportDocument) -> RenderResult<Vec<u8>> {
    render_document(DocxRenderer::new(), doc)
}
