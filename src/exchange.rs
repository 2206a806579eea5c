//! Roster CSV import and results CSV export.

use crate::error::{RecordsError, RecordsResult};
use crate::model::Subject;
use crate::performance::ResultRow;
use crate::roster::{zeroed_marks, ImportedRow};
use serde::Serialize;

const NAME_HEADERS: [&str; 3] = ["listofstudents", "studentname", "name"];
const ENROLLMENT_HEADERS: [&str; 3] = ["enrollmentno", "enrollmentnumber", "enrollment"];

pub const RESULTS_HEADER: &str = "S.No,Enrollment No,Name,Result,SGPA,CGPA";

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                buf.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if ch == ',' && !in_quotes {
            out.push(buf);
            buf = String::new();
            i += 1;
            continue;
        }
        buf.push(ch);
        i += 1;
    }
    out.push(buf);
    out
}

/// Lowercase and keep only ASCII letters and digits ("Enrollment No." -> "enrollmentno").
pub fn normalize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// A data row that was skipped during import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDiagnostic {
    pub line: usize,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRoster {
    pub rows: Vec<ImportedRow>,
    pub diagnostics: Vec<RowDiagnostic>,
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    headers.iter().position(|h| candidates.contains(&h.as_str()))
}

/// Parses a roster CSV into import rows with zero marks for every subject.
/// Blank lines are ignored; line numbers in diagnostics are 1-based and count
/// every physical line.
pub fn parse_roster_csv(text: &str, subjects: &[Subject]) -> RecordsResult<ParsedRoster> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();
    if lines.len() < 2 {
        return Err(RecordsError::MalformedCsvHeader(
            "CSV file is empty or has only a header".to_string(),
        ));
    }

    let headers: Vec<String> = parse_csv_record(lines[0].1)
        .iter()
        .map(|h| normalize_header(h))
        .collect();
    let (Some(name_col), Some(enrollment_col)) = (
        find_column(&headers, &NAME_HEADERS),
        find_column(&headers, &ENROLLMENT_HEADERS),
    ) else {
        return Err(RecordsError::MalformedCsvHeader(
            "CSV must have a student name column (\"List of Students\", \"Student Name\" or \"Name\") and an enrollment column (\"Enrollment No\", \"Enrollment Number\" or \"Enrollment\")".to_string(),
        ));
    };

    let mut rows = Vec::new();
    let mut diagnostics = Vec::new();
    for (line, raw) in lines.iter().skip(1) {
        let fields = parse_csv_record(raw);
        let cell = |i: usize| fields.get(i).map(|v| v.trim()).unwrap_or("");
        let name = cell(name_col);
        let enrollment_no = cell(enrollment_col);
        if name.is_empty() || enrollment_no.is_empty() {
            diagnostics.push(RowDiagnostic {
                line: *line,
                code: "malformed_row",
                message: "row is missing a student name or enrollment number".to_string(),
            });
            continue;
        }
        rows.push(ImportedRow {
            name: name.to_string(),
            enrollment_no: enrollment_no.to_string(),
            marks: zeroed_marks(subjects),
        });
    }
    Ok(ParsedRoster { rows, diagnostics })
}

/// Results sheet; the name column is always quoted.
pub fn export_results_csv(rows: &[ResultRow]) -> String {
    let mut out = String::new();
    out.push_str(RESULTS_HEADER);
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{},{},\"{}\",{},{},{}\n",
            r.serial,
            csv_quote(&r.enrollment_no),
            r.name.replace('"', "\"\""),
            if r.passed { "PASS" } else { "FAIL" },
            r.sgpa,
            r.cgpa
        ));
    }
    out
}
