use log::{debug, info, warn};

use crate::aggregate::{aggregate, cross_aggregate};
use crate::config::*;
use crate::narrative::narrate;

/// The label of the grand-total rows.
pub const TOTAL_LABEL: &str = "Total";

/// Compiles a report structure against a dataset into an ordered list of nodes.
///
/// The nodes follow the declaration order of the chapters and of their items. An item
/// that cannot be computed is replaced by a paragraph explaining why it was skipped;
/// it never stops the rest of the report.
pub fn compile(structure: &ReportStructure, dataset: &Dataset) -> Vec<RenderNode> {
    info!(
        "Compiling report {:?}: {} chapters over {} rows",
        structure.title,
        structure.chapters.len(),
        dataset.num_rows()
    );
    let mut nodes: Vec<RenderNode> = Vec::new();
    for chapter in structure.chapters.iter() {
        nodes.push(RenderNode::Heading(1, chapter.title.clone()));
        for item in chapter.items.iter() {
            debug!("compile: chapter {:?} item {:?}", chapter.title, item);
            match item {
                AnalysisItem::SingleVariable { column } => {
                    compile_single(&mut nodes, dataset, column)
                }
                AnalysisItem::CrossTab { column_x, column_y } => {
                    compile_cross(&mut nodes, dataset, column_x, column_y)
                }
            }
        }
    }
    nodes
}

/// Compiles the report and attaches its title.
pub fn compile_document(structure: &ReportStructure, dataset: &Dataset) -> ReportDocument {
    ReportDocument {
        title: structure.title.clone(),
        nodes: compile(structure, dataset),
    }
}

fn compile_single(nodes: &mut Vec<RenderNode>, dataset: &Dataset, column: &str) {
    match aggregate(dataset, column) {
        Ok((freq, pct)) => {
            nodes.push(RenderNode::Heading(2, format!("Analysis: {}", column)));
            nodes.push(RenderNode::Table(frequency_rows(&freq)));
            nodes.push(RenderNode::Table(percent_rows(&pct)));
            nodes.push(RenderNode::Paragraph(narrate(column, &freq, &pct)));
        }
        Err(e) => {
            warn!("compile: skipping analysis of {:?}: {}", column, e);
            nodes.push(RenderNode::Paragraph(skip_notice(
                &format!("Analysis of \"{}\"", column),
                &e,
            )));
        }
    }
}

fn compile_cross(nodes: &mut Vec<RenderNode>, dataset: &Dataset, column_x: &str, column_y: &str) {
    match cross_aggregate(dataset, column_x, column_y) {
        Ok(ct) => {
            nodes.push(RenderNode::Heading(
                2,
                format!("Cross Tabulation: {} by {}", column_x, column_y),
            ));
            nodes.push(RenderNode::Table(cross_rows(&ct)));
        }
        Err(e) => {
            warn!(
                "compile: skipping cross tabulation of {:?} by {:?}: {}",
                column_x, column_y, e
            );
            nodes.push(RenderNode::Paragraph(skip_notice(
                &format!("Cross tabulation of \"{}\" by \"{}\"", column_x, column_y),
                &e,
            )));
        }
    }
}

/// The paragraph standing in for an item that could not be computed.
pub fn skip_notice(what: &str, e: &AggregateError) -> String {
    format!("{} was skipped: {}.", what, e)
}

pub fn frequency_rows(freq: &FrequencyTable) -> Vec<Vec<String>> {
    let mut rows = vec![vec![freq.column.clone(), "Frequency".to_string()]];
    for (c, n) in freq.entries.iter() {
        rows.push(vec![c.clone(), n.to_string()]);
    }
    rows.push(vec![TOTAL_LABEL.to_string(), freq.total.to_string()]);
    rows
}

pub fn percent_rows(pct: &PercentTable) -> Vec<Vec<String>> {
    let mut rows = vec![vec![pct.column.clone(), "Percent (%)".to_string()]];
    for (c, p) in pct.entries.iter() {
        rows.push(vec![c.clone(), format!("{:.1}", p)]);
    }
    rows.push(vec![TOTAL_LABEL.to_string(), format!("{:.1}", pct.total)]);
    rows
}

/// The header row holds the name of the row column, then the column labels.
pub fn cross_rows(ct: &CrossTable) -> Vec<Vec<String>> {
    let mut header = vec![ct.row_column.clone()];
    header.extend(ct.col_labels.iter().cloned());
    let mut rows = vec![header];
    for (label, counts) in ct.row_labels.iter().zip(ct.counts.iter()) {
        let mut row = vec![label.clone()];
        row.extend(counts.iter().map(|n| n.to_string()));
        rows.push(row);
    }
    rows
}
