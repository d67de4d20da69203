use crate::config::{FrequencyTable, PercentTable};

fn respondents(n: u64) -> String {
    if n == 1 {
        "1 respondent".to_string()
    } else {
        format!("{} respondents", n)
    }
}

/// The sentence used when a column has no category to describe.
pub fn insufficient_data(column: &str) -> String {
    format!("There is insufficient data to describe \"{}\".", column)
}

/// Summarizes a frequency table in one sentence, naming the most and the least
/// frequent categories.
///
/// Ties are resolved in favour of the category listed first. The grand total is not a
/// category. A table with a single category names it both as the majority and as the
/// minority.
pub fn narrate(column: &str, freq: &FrequencyTable, pct: &PercentTable) -> String {
    let mut max: Option<&(String, u64)> = None;
    let mut min: Option<&(String, u64)> = None;
    for entry in freq.entries.iter() {
        if max.map_or(true, |m| entry.1 > m.1) {
            max = Some(entry);
        }
        if min.map_or(true, |m| entry.1 < m.1) {
            min = Some(entry);
        }
    }
    match (max, min) {
        (Some((max_cat, max_n)), Some((min_cat, min_n))) => {
            let max_pct = pct.percent_of(max_cat).unwrap_or(0.0);
            let min_pct = pct.percent_of(min_cat).unwrap_or(0.0);
            format!(
                "For \"{}\", the majority category is \"{}\" ({}, {:.1}%) and the minority category is \"{}\" ({}, {:.1}%).",
                column,
                max_cat,
                respondents(*max_n),
                max_pct,
                min_cat,
                respondents(*min_n),
                min_pct
            )
        }
        _ => insufficient_data(column),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::config::Dataset;

    fn tables(column: &str, values: &[&str]) -> (FrequencyTable, PercentTable) {
        let ds = Dataset::new(
            vec![column.to_string()],
            values.iter().map(|v| vec![Some(v.to_string())]).collect(),
        );
        aggregate(&ds, column).unwrap()
    }

    #[test]
    fn names_majority_and_minority() {
        let (freq, pct) = tables("Gender", &["Male", "Female", "Male", "Male"]);
        assert_eq!(
            narrate("Gender", &freq, &pct),
            "For \"Gender\", the majority category is \"Male\" (3 respondents, 75.0%) and the minority category is \"Female\" (1 respondent, 25.0%)."
        );
    }

    #[test]
    fn single_category_is_both() {
        let (freq, pct) = tables("Q", &["Yes"; 5]);
        assert_eq!(
            narrate("Q", &freq, &pct),
            "For \"Q\", the majority category is \"Yes\" (5 respondents, 100.0%) and the minority category is \"Yes\" (5 respondents, 100.0%)."
        );
    }

    #[test]
    fn minimum_tie_picks_first_listed() {
        let (freq, pct) = tables("Q", &["a", "a", "a", "b", "c"]);
        let s = narrate("Q", &freq, &pct);
        assert!(s.contains("minority category is \"b\""), "{}", s);
    }

    #[test]
    fn empty_table_is_insufficient() {
        let freq = FrequencyTable {
            column: "Q".to_string(),
            entries: vec![],
            total: 0,
        };
        let pct = PercentTable {
            column: "Q".to_string(),
            entries: vec![],
            total: 0.0,
        };
        assert_eq!(narrate("Q", &freq, &pct), insufficient_data("Q"));
    }

    #[test]
    fn narrate_is_deterministic() {
        let (freq, pct) = tables("Q", &["x", "y", "y", "z"]);
        assert_eq!(narrate("Q", &freq, &pct), narrate("Q", &freq, &pct));
    }
}
