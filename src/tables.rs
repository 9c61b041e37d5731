use std::io::{Read, Write};

use crate::domain::{IdentityResolver, SourceKind};
use crate::error::UnifyError;

pub const ID_COLUMN: &str = "Peptide ID";
pub const N_TERMINUS_COLUMN: &str = "N TERMINUS";
pub const SEQUENCE_COLUMN: &str = "SEQUENCE";
pub const C_TERMINUS_COLUMN: &str = "C TERMINUS";

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub names: &'static [&'static str],
}

impl ColumnSpec {
    pub const fn new(names: &'static [&'static str]) -> Self {
        Self { names }
    }

    pub fn canonical(&self) -> &'static str {
        self.names[0]
    }
}

const ID: ColumnSpec = ColumnSpec::new(&[ID_COLUMN, "ID", "PeptideID"]);
const N_TERMINUS: ColumnSpec = ColumnSpec::new(&[N_TERMINUS_COLUMN, "N-terminus", "nTerminus"]);
const SEQUENCE: ColumnSpec = ColumnSpec::new(&[SEQUENCE_COLUMN, "sequence"]);
const C_TERMINUS: ColumnSpec = ColumnSpec::new(&[C_TERMINUS_COLUMN, "C-terminus", "cTerminus"]);
const ORGANISM: ColumnSpec =
    ColumnSpec::new(&["targetSpecies", "Target Species", "organism", "target"]);
const CONCENTRATION: ColumnSpec = ColumnSpec::new(&["concentration", "value"]);
const UNIT: ColumnSpec = ColumnSpec::new(&["unit", "units"]);
const QUALIFIER: ColumnSpec = ColumnSpec::new(&["qualifier", "inequality"]);
const MEASURE: ColumnSpec =
    ColumnSpec::new(&["activityMeasureGroup", "activity measure", "measure"]);
const SMILES: ColumnSpec = ColumnSpec::new(&["SMILES"]);
const LOG_P: ColumnSpec = ColumnSpec::new(&["logP"]);
const LOG_D: ColumnSpec = ColumnSpec::new(&["logD"]);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        Self { headers, records }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, UnifyError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|err| UnifyError::Csv(err.to_string()))?
            .iter()
            .enumerate()
            .map(|(index, header)| {
                let header = if index == 0 {
                    header.trim_start_matches('\u{feff}')
                } else {
                    header
                };
                header.trim().to_string()
            })
            .collect();
        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| UnifyError::Csv(err.to_string()))?;
            records.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, records })
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), UnifyError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer
            .write_record(&self.headers)
            .map_err(|err| UnifyError::Csv(err.to_string()))?;
        for record in &self.records {
            writer
                .write_record(record)
                .map_err(|err| UnifyError::Csv(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| UnifyError::Filesystem(err.to_string()))
    }

    pub fn find(&self, spec: ColumnSpec) -> Option<usize> {
        spec.names.iter().find_map(|name| {
            self.headers
                .iter()
                .position(|header| header.eq_ignore_ascii_case(name))
        })
    }

    pub fn require(&self, source: SourceKind, spec: ColumnSpec) -> Result<usize, UnifyError> {
        self.find(spec).ok_or_else(|| UnifyError::MissingRequiredColumn {
            table: source,
            column: spec.canonical().to_string(),
        })
    }

    fn cell(record: &[String], index: usize) -> &str {
        record.get(index).map(|value| value.trim()).unwrap_or("")
    }

    fn optional_cell(record: &[String], index: Option<usize>) -> Option<String> {
        index
            .map(|index| Self::cell(record, index))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

pub trait KeyedRow {
    fn raw_id(&self) -> &str;
    fn n_terminus(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhyschemRow {
    pub raw_id: String,
    pub n_terminus: String,
    pub sequence: Option<String>,
    pub c_terminus: Option<String>,
    pub properties: Vec<String>,
}

impl KeyedRow for PhyschemRow {
    fn raw_id(&self) -> &str {
        &self.raw_id
    }

    fn n_terminus(&self) -> &str {
        &self.n_terminus
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhyschemTable {
    pub property_columns: Vec<String>,
    pub rows: Vec<PhyschemRow>,
}

impl PhyschemTable {
    pub fn from_raw(table: &RawTable) -> Result<Self, UnifyError> {
        let source = SourceKind::Physchem;
        let id = table.require(source, ID)?;
        let n_terminus = table.require(source, N_TERMINUS)?;
        let sequence = table.find(SEQUENCE);
        let c_terminus = table.find(C_TERMINUS);

        let fixed = [Some(id), Some(n_terminus), sequence, c_terminus];
        let property_indices: Vec<usize> = (0..table.headers.len())
            .filter(|index| !fixed.contains(&Some(*index)))
            .collect();
        let property_columns = property_indices
            .iter()
            .map(|index| table.headers[*index].clone())
            .collect();

        let rows = table
            .records
            .iter()
            .map(|record| PhyschemRow {
                raw_id: RawTable::cell(record, id).to_string(),
                n_terminus: RawTable::cell(record, n_terminus).to_string(),
                sequence: RawTable::optional_cell(record, sequence),
                c_terminus: RawTable::optional_cell(record, c_terminus),
                properties: property_indices
                    .iter()
                    .map(|index| RawTable::cell(record, *index).to_string())
                    .collect(),
            })
            .collect();

        Ok(Self {
            property_columns,
            rows,
        })
    }

    pub fn to_raw(&self) -> RawTable {
        let mut headers = vec![
            ID_COLUMN.to_string(),
            N_TERMINUS_COLUMN.to_string(),
            SEQUENCE_COLUMN.to_string(),
            C_TERMINUS_COLUMN.to_string(),
        ];
        headers.extend(self.property_columns.iter().cloned());
        let records = self
            .rows
            .iter()
            .map(|row| {
                let mut record = vec![
                    row.raw_id.clone(),
                    row.n_terminus.clone(),
                    row.sequence.clone().unwrap_or_default(),
                    row.c_terminus.clone().unwrap_or_default(),
                ];
                record.extend(row.properties.iter().cloned());
                record
            })
            .collect();
        RawTable::new(headers, records)
    }

    pub fn property<'a>(&self, row: &'a PhyschemRow, name: &str) -> Option<&'a str> {
        let index = self
            .property_columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))?;
        row.properties
            .get(index)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRow {
    pub raw_id: String,
    pub n_terminus: String,
    pub organism: String,
    pub concentration: String,
    pub unit: String,
    pub qualifier: Option<String>,
    pub measure: Option<String>,
    pub sequence: Option<String>,
    pub c_terminus: Option<String>,
}

impl KeyedRow for ActivityRow {
    fn raw_id(&self) -> &str {
        &self.raw_id
    }

    fn n_terminus(&self) -> &str {
        &self.n_terminus
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityTable {
    pub rows: Vec<ActivityRow>,
}

impl ActivityTable {
    const HEADERS: [&'static str; 9] = [
        ID_COLUMN,
        N_TERMINUS_COLUMN,
        SEQUENCE_COLUMN,
        C_TERMINUS_COLUMN,
        "activityMeasureGroup",
        "targetSpecies",
        "qualifier",
        "concentration",
        "unit",
    ];

    pub fn from_raw(table: &RawTable) -> Result<Self, UnifyError> {
        let source = SourceKind::Activity;
        let id = table.require(source, ID)?;
        let n_terminus = table.require(source, N_TERMINUS)?;
        let organism = table.require(source, ORGANISM)?;
        let concentration = table.require(source, CONCENTRATION)?;
        let unit = table.require(source, UNIT)?;
        let qualifier = table.find(QUALIFIER);
        let measure = table.find(MEASURE);
        let sequence = table.find(SEQUENCE);
        let c_terminus = table.find(C_TERMINUS);

        let rows = table
            .records
            .iter()
            .map(|record| ActivityRow {
                raw_id: RawTable::cell(record, id).to_string(),
                n_terminus: RawTable::cell(record, n_terminus).to_string(),
                organism: RawTable::cell(record, organism).to_string(),
                concentration: RawTable::cell(record, concentration).to_string(),
                unit: RawTable::cell(record, unit).to_string(),
                qualifier: RawTable::optional_cell(record, qualifier),
                measure: RawTable::optional_cell(record, measure),
                sequence: RawTable::optional_cell(record, sequence),
                c_terminus: RawTable::optional_cell(record, c_terminus),
            })
            .collect();
        Ok(Self { rows })
    }

    pub fn to_raw(&self) -> RawTable {
        let headers = Self::HEADERS.iter().map(|h| h.to_string()).collect();
        let records = self
            .rows
            .iter()
            .map(|row| {
                vec![
                    row.raw_id.clone(),
                    row.n_terminus.clone(),
                    row.sequence.clone().unwrap_or_default(),
                    row.c_terminus.clone().unwrap_or_default(),
                    row.measure.clone().unwrap_or_default(),
                    row.organism.clone(),
                    row.qualifier.clone().unwrap_or_default(),
                    row.concentration.clone(),
                    row.unit.clone(),
                ]
            })
            .collect();
        RawTable::new(headers, records)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LipophilicityRow {
    pub raw_id: String,
    pub n_terminus: String,
    pub smiles: Option<String>,
    pub log_p: Option<String>,
    pub log_d: Option<String>,
    pub extras: Vec<String>,
}

impl KeyedRow for LipophilicityRow {
    fn raw_id(&self) -> &str {
        &self.raw_id
    }

    fn n_terminus(&self) -> &str {
        &self.n_terminus
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LipophilicityTable {
    pub extra_columns: Vec<String>,
    pub rows: Vec<LipophilicityRow>,
}

impl LipophilicityTable {
    pub fn from_raw(table: &RawTable) -> Result<Self, UnifyError> {
        let source = SourceKind::Lipophilicity;
        let id = table.require(source, ID)?;
        let n_terminus = table.require(source, N_TERMINUS)?;
        let smiles = table.find(SMILES);
        let log_p = table.find(LOG_P);
        let log_d = table.find(LOG_D);
        // the sequence is owned by the physchem table
        let sequence = table.find(SEQUENCE);
        let c_terminus = table.find(C_TERMINUS);

        let fixed = [
            Some(id),
            Some(n_terminus),
            smiles,
            log_p,
            log_d,
            sequence,
            c_terminus,
        ];
        let extra_indices: Vec<usize> = (0..table.headers.len())
            .filter(|index| !fixed.contains(&Some(*index)))
            .collect();
        let extra_columns = extra_indices
            .iter()
            .map(|index| table.headers[*index].clone())
            .collect();

        let rows = table
            .records
            .iter()
            .map(|record| LipophilicityRow {
                raw_id: RawTable::cell(record, id).to_string(),
                n_terminus: RawTable::cell(record, n_terminus).to_string(),
                smiles: RawTable::optional_cell(record, smiles),
                log_p: RawTable::optional_cell(record, log_p),
                log_d: RawTable::optional_cell(record, log_d),
                extras: extra_indices
                    .iter()
                    .map(|index| RawTable::cell(record, *index).to_string())
                    .collect(),
            })
            .collect();

        Ok(Self {
            extra_columns,
            rows,
        })
    }
}

pub fn read_peptide_ids(
    table: &RawTable,
    resolver: &IdentityResolver,
) -> Result<(Vec<u64>, usize), UnifyError> {
    let id = table.require(SourceKind::Physchem, ID)?;
    let mut ids = Vec::new();
    let mut skipped = 0;
    for (row, record) in table.records.iter().enumerate() {
        let raw = RawTable::cell(record, id);
        match resolver.resolve(raw, "") {
            Ok(key) if !ids.contains(&key.number()) => ids.push(key.number()),
            Ok(_) => {}
            Err(_) => {
                tracing::warn!(row, raw, "skipping invalid peptide id");
                skipped += 1;
            }
        }
    }
    Ok((ids, skipped))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn raw(headers: &[&str], records: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            records
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn physchem_splits_fixed_and_property_columns() {
        let table = raw(
            &["ID", "N TERMINUS", "SEQUENCE", "Net Charge", "Hydrophobicity"],
            &[&["51", "C16", "KLK", "3", "-0.2"]],
        );
        let physchem = PhyschemTable::from_raw(&table).unwrap();
        assert_eq!(physchem.property_columns, vec!["Net Charge", "Hydrophobicity"]);
        let row = &physchem.rows[0];
        assert_eq!(row.sequence.as_deref(), Some("KLK"));
        assert_eq!(row.c_terminus, None);
        assert_eq!(physchem.property(row, "net charge"), Some("3"));
    }

    #[test]
    fn missing_required_column_fails_fast() {
        let table = raw(&["Peptide ID", "targetSpecies", "unit"], &[]);
        let err = ActivityTable::from_raw(&table).unwrap_err();
        assert_matches!(
            err,
            UnifyError::MissingRequiredColumn { table: SourceKind::Activity, ref column }
                if column == N_TERMINUS_COLUMN
        );
    }

    #[test]
    fn reads_csv_with_bom_and_short_rows() {
        let text = "\u{feff}Peptide ID,N TERMINUS,SMILES,logP\n7,C16,CCO,1.5\n8,C16\n";
        let table = RawTable::from_reader(text.as_bytes()).unwrap();
        let lipophilicity = LipophilicityTable::from_raw(&table).unwrap();
        assert_eq!(lipophilicity.rows.len(), 2);
        assert_eq!(lipophilicity.rows[0].log_p.as_deref(), Some("1.5"));
        assert_eq!(lipophilicity.rows[1].smiles, None);
        assert!(lipophilicity.extra_columns.is_empty());
    }

    #[test]
    fn peptide_id_list_dedups_and_skips() {
        let table = raw(&["id"], &[&["DBAASPS_51"], &["51"], &[""], &["x"], &["838"]]);
        let (ids, skipped) = read_peptide_ids(&table, &IdentityResolver::default()).unwrap();
        assert_eq!(ids, vec![51, 838]);
        assert_eq!(skipped, 2);
    }
}
