//! Download naming and content types.

use std::path::Path;

use chrono::NaiveDate;

/// MIME type from the file extension, `application/octet-stream` otherwise.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "pdf" => "application/pdf",
        "md" => "text/markdown; charset=utf-8",
        "json" => "application/json",
        "csv" => "text/csv; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Collapse anything outside `[A-Za-z0-9._-]` into single dashes.
pub fn sanitize(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        "report".to_string()
    } else {
        trimmed.chars().take(80).collect()
    }
}

/// `{title}-{template}-{YYYY-MM-DD}.{ext}`, safe for a Content-Disposition header.
pub fn download_file_name(title: &str, template: &str, date: NaiveDate, extension: &str) -> String {
    format!(
        "{}-{}-{}.{}",
        sanitize(title),
        sanitize(template),
        date.format("%Y-%m-%d"),
        sanitize(extension.trim_start_matches('.'))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types() {
        assert_eq!(content_type_for(Path::new("a/b/report.PPTX")), "application/vnd.openxmlformats-officedocument.presentationml.presentation");
        assert_eq!(content_type_for(Path::new("x.md")), "text/markdown; charset=utf-8");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn file_names_are_sanitized() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(
            download_file_name("Q3 Status / \"Apollo\"", "standard", date, "md"),
            "Q3-Status-Apollo-standard-2026-03-01.md"
        );
        assert_eq!(download_file_name("../../etc", "x", date, ".pdf"), "etc-x-2026-03-01.pdf");
        assert_eq!(download_file_name("   ", "standard", date, "md"), "report-standard-2026-03-01.md");
    }
}
