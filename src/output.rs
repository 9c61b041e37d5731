use std::io::{self, Write};

use camino::Utf8Path;
use serde::Serialize;

use crate::activity::{ActivitySummary, split_organism};
use crate::error::UnifyError;
use crate::fs_util;
use crate::pipeline::{ProgressEvent, ProgressSink};
use crate::tables::{ID_COLUMN, N_TERMINUS_COLUMN, RawTable};

const SUMMARY_HEADERS: [&str; 9] = [
    ID_COLUMN,
    N_TERMINUS_COLUMN,
    "organism",
    "species",
    "strain",
    "value_uM",
    "qualifier",
    "provenance",
    "measurements",
];

pub fn summaries_table(summaries: &[ActivitySummary], empty_marker: &str) -> RawTable {
    let headers = SUMMARY_HEADERS.iter().map(|h| h.to_string()).collect();
    let records = summaries
        .iter()
        .map(|summary| {
            let (species, strain) = split_organism(&summary.organism);
            vec![
                summary.key.id_string(),
                summary.key.n_terminus().to_string(),
                summary.organism.clone(),
                species,
                strain.unwrap_or_else(|| empty_marker.to_string()),
                summary
                    .value_um
                    .map_or_else(|| empty_marker.to_string(), |value| value.to_string()),
                summary
                    .qualifier
                    .map_or_else(|| empty_marker.to_string(), |q| q.symbol().to_string()),
                summary.provenance.to_string(),
                format!("{}/{}", summary.contributing, summary.total),
            ]
        })
        .collect();
    RawTable::new(headers, records)
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = Self::render(value)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }

    pub fn write<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), UnifyError> {
        let mut json = Self::render(value).map_err(|err| UnifyError::Filesystem(err.to_string()))?;
        json.push('\n');
        fs_util::write_bytes_atomic(path, json.as_bytes())
    }

    fn render<T: Serialize>(value: &T) -> io::Result<String> {
        serde_json::to_string_pretty(value).map_err(io::Error::other)
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Provenance, Qualifier, resolve};

    #[test]
    fn summary_rows_split_organism() {
        let summary = ActivitySummary {
            key: resolve("DBAASPS_7", "c16").unwrap(),
            organism: "Escherichia coli ATCC 25922".to_string(),
            value_um: Some(4.0),
            qualifier: Some(Qualifier::Lt),
            provenance: Provenance::QualifierBound,
            contributing: 1,
            total: 2,
        };
        let table = summaries_table(&[summary], "NA");
        assert_eq!(
            table.records[0],
            vec![
                "DBAASPS_7",
                "C16",
                "Escherichia coli ATCC 25922",
                "Escherichia coli",
                "ATCC 25922",
                "4",
                "<",
                "qualifier-bound",
                "1/2"
            ]
        );
    }
}
