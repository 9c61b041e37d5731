use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

pub const DEFAULT_COMMENT_MARKER: &str = "#";

const TRAILING_FIELDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfAssemblyRecord {
    pub sequence: String,
    pub n_terminus: String,
    pub free_energy: f64,
    pub npol: f64,
    pub curvature: f64,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Blank,
    Comment,
    TooFewFields,
    NonNumeric,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Blank => write!(f, "blank line"),
            SkipReason::Comment => write!(f, "comment"),
            SkipReason::TooFewFields => write!(f, "too few fields"),
            SkipReason::NonNumeric => write!(f, "non-numeric value"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    pub lines: usize,
    pub parsed: usize,
    pub skipped: usize,
    pub overwritten: usize,
    pub skipped_lines: Vec<SkippedLine>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelfAssemblyTable {
    records: BTreeMap<(String, String), SelfAssemblyRecord>,
}

impl SelfAssemblyTable {
    pub fn get(&self, sequence: &str, n_terminus: &str) -> Option<&SelfAssemblyRecord> {
        self.records
            .get(&(normalize_token(sequence), normalize_token(n_terminus)))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn insert(&mut self, record: SelfAssemblyRecord) -> bool {
        let key = (record.sequence.clone(), record.n_terminus.clone());
        self.records.insert(key, record).is_some()
    }
}

/// Parses the whitespace-delimited descriptor file.
///
/// Each data line ends in `sequence n_terminus free_energy npol curvature`;
/// anything before those five fields is ignored. Bad lines are skipped and
/// reported; a repeated key keeps the last line.
pub fn parse(raw: &str, comment_marker: &str) -> (SelfAssemblyTable, ParseReport) {
    let mut table = SelfAssemblyTable::default();
    let mut report = ParseReport::default();

    for (index, line) in raw.lines().enumerate() {
        let line_number = index + 1;
        report.lines += 1;
        match parse_line(line, line_number, comment_marker) {
            Ok(record) => {
                report.parsed += 1;
                if table.insert(record) {
                    report.overwritten += 1;
                }
            }
            Err(reason) => {
                report.skipped += 1;
                report.skipped_lines.push(SkippedLine {
                    line: line_number,
                    reason,
                });
            }
        }
    }

    tracing::debug!(
        parsed = report.parsed,
        skipped = report.skipped,
        overwritten = report.overwritten,
        "parsed self-assembly descriptors"
    );
    (table, report)
}

fn parse_line(
    line: &str,
    line_number: usize,
    comment_marker: &str,
) -> Result<SelfAssemblyRecord, SkipReason> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(SkipReason::Blank);
    }
    if !comment_marker.is_empty() && trimmed.starts_with(comment_marker) {
        return Err(SkipReason::Comment);
    }

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() < TRAILING_FIELDS {
        return Err(SkipReason::TooFewFields);
    }
    let &[sequence, n_terminus, free_energy, npol, curvature] =
        &fields[fields.len() - TRAILING_FIELDS..]
    else {
        return Err(SkipReason::TooFewFields);
    };

    Ok(SelfAssemblyRecord {
        sequence: normalize_token(sequence),
        n_terminus: normalize_token(n_terminus),
        free_energy: parse_number(free_energy)?,
        npol: parse_number(npol)?,
        curvature: parse_number(curvature)?,
        line: line_number,
    })
}

fn parse_number(field: &str) -> Result<f64, SkipReason> {
    field
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or(SkipReason::NonNumeric)
}

fn normalize_token(value: &str) -> String {
    value.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_five_fields() {
        let (table, report) = parse("extra tok1 tok2 SEQABC C16 -12.3 45 0.08", "#");
        assert_eq!(report.parsed, 1);
        let record = table.get("SEQABC", "C16").unwrap();
        assert_eq!(record.free_energy, -12.3);
        assert_eq!(record.npol, 45.0);
        assert_eq!(record.curvature, 0.08);
    }

    #[test]
    fn skips_malformed_lines() {
        let text = "# header comment\n\nKLK C16 -1.0 12\nKLK C16 abc 12 0.1\nKLK C16 -2 10 0.2\n";
        let (table, report) = parse(text, "#");
        assert_eq!(table.len(), 1);
        assert_eq!(report.lines, 5);
        assert_eq!(report.skipped, 4);
        let reasons: Vec<SkipReason> = report.skipped_lines.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::Comment,
                SkipReason::Blank,
                SkipReason::TooFewFields,
                SkipReason::NonNumeric
            ]
        );
    }

    #[test]
    fn last_duplicate_wins() {
        let text = "KLK C16 -1 10 0.1\nklk c16 -3 30 0.3\n";
        let (table, report) = parse(text, "#");
        assert_eq!(report.overwritten, 1);
        let record = table.get("KLK", "C16").unwrap();
        assert_eq!(record.free_energy, -3.0);
        assert_eq!(record.line, 2);
    }
}
