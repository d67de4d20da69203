use std::path::Path;

/// File name of the exported document, derived from the report title.
///
/// Letters and digits are kept in lowercase and everything else collapses to single
/// underscores: "Gender study (2024)" gives `gender_study_2024.docx`.
pub fn document_file_name(title: &str) -> String {
    let mut stem = String::new();
    for c in title.chars() {
        if c.is_alphanumeric() {
            stem.extend(c.to_lowercase());
        } else if !stem.is_empty() && !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_end_matches('_');
    if stem.is_empty() {
        "report.docx".to_string()
    } else {
        format!("{}.docx", stem)
    }
}

/// The name of a file, for the messages. Falls back on the full path.
pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}
