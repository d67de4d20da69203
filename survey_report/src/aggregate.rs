use std::collections::HashMap;

use log::debug;
use snafu::prelude::*;

use crate::config::*;

pub type AggregateResult<T> = Result<T, AggregateError>;

/// Rounds to one decimal place, half away from zero.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn column_cells<'a>(dataset: &'a Dataset, column: &str) -> AggregateResult<Vec<Option<&'a str>>> {
    ensure!(!dataset.is_empty(), EmptyDatasetSnafu {});
    dataset
        .column(column)
        .context(MissingColumnSnafu { column })
}

/// Counts the distinct non-missing values of a column.
///
/// The categories are sorted by decreasing count. Categories with the same count keep
/// the order in which they are first encountered. The percentages are computed over the
/// non-missing values and rounded to one decimal; the percent table lists the
/// categories in exactly the same order as the frequency table.
pub fn aggregate(
    dataset: &Dataset,
    column: &str,
) -> AggregateResult<(FrequencyTable, PercentTable)> {
    let cells = column_cells(dataset, column)?;

    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut entries: Vec<(String, u64)> = Vec::new();
    for value in cells.into_iter().flatten() {
        match positions.get(value) {
            Some(idx) => entries[*idx].1 += 1,
            None => {
                positions.insert(value, entries.len());
                entries.push((value.to_string(), 1));
            }
        }
    }
    // Stable sort: ties stay in first-seen order.
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    let total: u64 = entries.iter().map(|(_, n)| *n).sum();
    debug!(
        "aggregate: column {:?}: {} categories, {} values",
        column,
        entries.len(),
        total
    );

    let pct_entries: Vec<(String, f64)> = entries
        .iter()
        .map(|(c, n)| (c.clone(), round1(100.0 * (*n as f64) / (total as f64))))
        .collect();
    // The sum of the rounded values, not a forced 100.0.
    let pct_total = round1(pct_entries.iter().map(|(_, p)| *p).sum());

    Ok((
        FrequencyTable {
            column: column.to_string(),
            entries,
            total,
        },
        PercentTable {
            column: column.to_string(),
            entries: pct_entries,
            total: pct_total,
        },
    ))
}

/// Builds the contingency matrix of two columns.
///
/// Rows and columns are labelled with the distinct values in first-seen order. A row of
/// the dataset with a missing value in either column is not counted.
pub fn cross_aggregate(
    dataset: &Dataset,
    column_x: &str,
    column_y: &str,
) -> AggregateResult<CrossTable> {
    let xs = column_cells(dataset, column_x)?;
    let ys = column_cells(dataset, column_y)?;

    let mut row_labels: Vec<String> = Vec::new();
    let mut col_labels: Vec<String> = Vec::new();
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for (x, y) in xs.into_iter().zip(ys) {
        if let (Some(x), Some(y)) = (x, y) {
            let i = label_index(&mut row_labels, x);
            let j = label_index(&mut col_labels, y);
            pairs.push((i, j));
        }
    }

    let mut counts = vec![vec![0_u64; col_labels.len()]; row_labels.len()];
    for (i, j) in pairs {
        counts[i][j] += 1;
    }
    debug!(
        "cross_aggregate: {:?} x {:?}: {}x{} cells",
        column_x,
        column_y,
        row_labels.len(),
        col_labels.len()
    );
    Ok(CrossTable {
        row_column: column_x.to_string(),
        col_column: column_y.to_string(),
        row_labels,
        col_labels,
        counts,
    })
}

fn label_index(labels: &mut Vec<String>, value: &str) -> usize {
    match labels.iter().position(|l| l == value) {
        Some(idx) => idx,
        None => {
            labels.push(value.to_string());
            labels.len() - 1
        }
    }
}
