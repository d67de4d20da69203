// Plain text preview, in a markdown-like layout that reads well in a terminal.

use crate::render::{printable, RenderResult, Renderer};

/// The line printed between two chapters.
pub const CHAPTER_RULE: &str = "---";

#[derive(Debug, Default)]
pub struct PreviewRenderer {
    out: String,
}

impl PreviewRenderer {
    pub fn new() -> PreviewRenderer {
        PreviewRenderer::default()
    }

    fn line(&mut self, s: &str) {
        self.out.push_str(&printable(s));
        self.out.push('\n');
    }
}

fn escape_cell(s: &str) -> String {
    printable(s).replace('|', "\\|").replace('\n', " ")
}

impl Renderer for PreviewRenderer {
    type Output = String;

    fn title(&mut self, text: &str) -> RenderResult<()> {
        self.line(&format!("# {}", text));
        self.line("");
        Ok(())
    }

    fn chapter_break(&mut self) -> RenderResult<()> {
        self.line(CHAPTER_RULE);
        self.line("");
        Ok(())
    }

    fn heading(&mut self, level: u8, text: &str) -> RenderResult<()> {
        // The title takes the first level.
        let marks = "#".repeat(level as usize + 1);
        self.line(&format!("{} {}", marks, text));
        self.line("");
        Ok(())
    }

    fn table(&mut self, rows: &[Vec<String>]) -> RenderResult<()> {
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|r| r.iter().map(|c| escape_cell(c)).collect())
            .collect();
        let num_cols = cells.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut widths = vec![1_usize; num_cols];
        for row in cells.iter() {
            for (idx, c) in row.iter().enumerate() {
                widths[idx] = widths[idx].max(c.chars().count());
            }
        }
        let format_row = |row: &[String]| -> String {
            let padded: Vec<String> = (0..num_cols)
                .map(|idx| {
                    let c = row.get(idx).map(|s| s.as_str()).unwrap_or("");
                    format!("{:<width$}", c, width = widths[idx])
                })
                .collect();
            format!("| {} |", padded.join(" | "))
        };
        for (idx, row) in cells.iter().enumerate() {
            let s = format_row(row);
            self.line(&s);
            if idx == 0 {
                let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
                self.line(&format!("|-{}-|", rule.join("-|-")));
            }
        }
        self.line("");
        Ok(())
    }

    fn paragraph(&mut self, text: &str) -> RenderResult<()> {
        self.line(text);
        self.line("");
        Ok(())
    }

    fn finish(self) -> RenderResult<String> {
        Ok(self.out)
    }
}
