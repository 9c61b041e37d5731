use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::activity::ActivitySummary;
use crate::domain::{IdentityResolver, PeptideKey, Provenance, RowRef, SourceKind};
use crate::error::UnifyError;
use crate::mass::cluster_sequence;
use crate::self_assembly::SelfAssemblyTable;
use crate::tables::{
    C_TERMINUS_COLUMN, ID_COLUMN, KeyedRow, LipophilicityRow, LipophilicityTable,
    N_TERMINUS_COLUMN, PhyschemRow, PhyschemTable, RawTable, SEQUENCE_COLUMN,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyConflict {
    pub source: SourceKind,
    pub key: PeptideKey,
    pub kept: RowRef,
    pub discarded: RowRef,
    pub identical: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub row: RowRef,
    pub raw_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub peptides: usize,
    pub organisms: usize,
    pub conflicts: Vec<KeyConflict>,
    pub rejected: Vec<RejectedRow>,
    pub missing_physchem: usize,
    pub missing_lipophilicity: usize,
    pub orphan_summaries: usize,
    pub self_assembly_matched: usize,
    pub self_assembly_not_found: usize,
    pub bridge_unresolved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum SelfAssemblyStatus {
    Matched {
        free_energy: f64,
        npol: f64,
        curvature: f64,
    },
    NotFound,
    BridgeUnresolved,
}

impl fmt::Display for SelfAssemblyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelfAssemblyStatus::Matched { .. } => write!(f, "matched"),
            SelfAssemblyStatus::NotFound => write!(f, "not-found"),
            SelfAssemblyStatus::BridgeUnresolved => write!(f, "bridge-unresolved"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LipophilicityFields {
    pub smiles: Option<String>,
    pub log_p: Option<String>,
    pub log_d: Option<String>,
    pub extras: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedRecord {
    pub key: PeptideKey,
    pub sequence: Option<String>,
    pub c_terminus: Option<String>,
    pub physchem: Option<Vec<String>>,
    pub activity: Vec<ActivitySummary>,
    pub lipophilicity: Option<LipophilicityFields>,
    pub self_assembly: SelfAssemblyStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnifiedTable {
    pub physchem_columns: Vec<String>,
    pub lipophilicity_columns: Vec<String>,
    pub organisms: Vec<String>,
    pub records: Vec<UnifiedRecord>,
}

const LIPOPHILICITY_FIELDS: [&str; 3] = ["SMILES", "logP", "logD"];
const SELF_ASSEMBLY_FIELDS: [&str; 4] = ["free_energy", "npol", "curvature", "self_assembly_status"];

const ACTIVITY_FIELDS: [&str; 5] = [
    "value_uM",
    "qualifier",
    "provenance",
    "organism",
    "measurements",
];

impl UnifiedTable {
    pub fn header(&self) -> Vec<String> {
        let activity: Vec<String> = self
            .organisms
            .iter()
            .flat_map(|organism| {
                ACTIVITY_FIELDS
                    .into_iter()
                    .map(move |field| format!("{organism} | {field}"))
            })
            .collect();
        let mut taken: Vec<String> = [ID_COLUMN, N_TERMINUS_COLUMN, SEQUENCE_COLUMN, C_TERMINUS_COLUMN]
            .into_iter()
            .chain(LIPOPHILICITY_FIELDS)
            .chain(SELF_ASSEMBLY_FIELDS)
            .map(str::to_string)
            .chain(activity.iter().cloned())
            .collect();
        let physchem = pass_through(SourceKind::Physchem, &self.physchem_columns, &taken);
        taken.extend(physchem.iter().cloned());
        let lipophilicity =
            pass_through(SourceKind::Lipophilicity, &self.lipophilicity_columns, &taken);

        let mut header: Vec<String> = [ID_COLUMN, N_TERMINUS_COLUMN, SEQUENCE_COLUMN, C_TERMINUS_COLUMN]
            .map(str::to_string)
            .to_vec();
        header.extend(physchem);
        header.extend(activity);
        header.extend(LIPOPHILICITY_FIELDS.map(str::to_string));
        header.extend(lipophilicity);
        header.extend(SELF_ASSEMBLY_FIELDS.map(str::to_string));
        header
    }

    pub fn rows(&self, empty_marker: &str) -> Vec<Vec<String>> {
        self.records
            .iter()
            .map(|record| self.render(record, empty_marker))
            .collect()
    }

    pub fn to_raw(&self, empty_marker: &str) -> RawTable {
        RawTable::new(self.header(), self.rows(empty_marker))
    }

    fn render(&self, record: &UnifiedRecord, empty: &str) -> Vec<String> {
        let text = |value: Option<&str>| {
            value
                .filter(|value| !value.is_empty())
                .unwrap_or(empty)
                .to_string()
        };
        let number = |value: Option<f64>| value.map_or_else(|| empty.to_string(), |v| v.to_string());

        let mut row = vec![
            record.key.id_string(),
            record.key.n_terminus().to_string(),
            text(record.sequence.as_deref()),
            text(record.c_terminus.as_deref()),
        ];
        match &record.physchem {
            Some(values) => row.extend(values.iter().map(|value| text(Some(value)))),
            None => row.extend(self.physchem_columns.iter().map(|_| empty.to_string())),
        }

        for summary in &record.activity {
            row.push(number(summary.value_um));
            row.push(text(summary.qualifier.map(|qualifier| qualifier.symbol())));
            row.push(summary.provenance.to_string());
            row.push(summary.organism.clone());
            row.push(summary.total.to_string());
        }

        match &record.lipophilicity {
            Some(fields) => {
                row.push(text(fields.smiles.as_deref()));
                row.push(text(fields.log_p.as_deref()));
                row.push(text(fields.log_d.as_deref()));
                row.extend(fields.extras.iter().map(|value| text(Some(value))));
            }
            None => {
                let width = 3 + self.lipophilicity_columns.len();
                row.extend((0..width).map(|_| empty.to_string()));
            }
        }

        match &record.self_assembly {
            SelfAssemblyStatus::Matched {
                free_energy,
                npol,
                curvature,
            } => {
                row.push(free_energy.to_string());
                row.push(npol.to_string());
                row.push(curvature.to_string());
            }
            _ => row.extend((0..3).map(|_| empty.to_string())),
        }
        row.push(record.self_assembly.to_string());
        row
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceMerger {
    resolver: IdentityResolver,
}

impl SourceMerger {
    pub fn new(resolver: IdentityResolver) -> Self {
        Self { resolver }
    }

    pub fn merge(
        &self,
        physchem: Option<&PhyschemTable>,
        summaries: &[ActivitySummary],
        lipophilicity: Option<&LipophilicityTable>,
        self_assembly: &SelfAssemblyTable,
    ) -> Result<(UnifiedTable, MergeReport), UnifyError> {
        let physchem = physchem.ok_or(UnifyError::MissingRequiredSource(SourceKind::Physchem))?;
        let lipophilicity = lipophilicity
            .ok_or(UnifyError::MissingRequiredSource(SourceKind::Lipophilicity))?;

        let mut report = MergeReport::default();
        let physchem_index =
            self.index(SourceKind::Physchem, &physchem.rows, &mut report);
        let lipophilicity_index =
            self.index(SourceKind::Lipophilicity, &lipophilicity.rows, &mut report);
        let sequence_rows = self.sequence_rows(&physchem.rows);

        let universe: BTreeSet<&PeptideKey> = physchem_index
            .keys()
            .chain(lipophilicity_index.keys())
            .collect();

        let mut activity = BTreeMap::<&PeptideKey, Vec<&ActivitySummary>>::new();
        let mut organisms = BTreeSet::new();
        for summary in summaries {
            if universe.contains(&summary.key) {
                organisms.insert(summary.organism.as_str());
                activity.entry(&summary.key).or_default().push(summary);
            } else {
                report.orphan_summaries += 1;
            }
        }
        let organisms: Vec<String> = organisms.into_iter().map(str::to_string).collect();

        let mut records = Vec::with_capacity(universe.len());
        for key in universe {
            let physchem_row = physchem_index.get(key).map(|(_, row)| *row);
            let lipophilicity_row = lipophilicity_index.get(key).map(|(_, row)| *row);
            if physchem_row.is_none() {
                report.missing_physchem += 1;
            }
            if lipophilicity_row.is_none() {
                report.missing_lipophilicity += 1;
            }

            let found = activity.get(key).map(Vec::as_slice).unwrap_or_default();
            let activity = organisms
                .iter()
                .map(|organism| {
                    found
                        .iter()
                        .find(|summary| &summary.organism == organism)
                        .map(|summary| (*summary).clone())
                        .unwrap_or_else(|| ActivitySummary::absent(key.clone(), organism.as_str()))
                })
                .collect();

            // A later duplicate may carry the sequence the kept row lacks.
            let bridge_row = physchem_row
                .filter(|row| has_sequence(row))
                .or_else(|| sequence_rows.get(key).copied());
            let status = bridge_self_assembly(key, bridge_row, self_assembly);
            match status {
                SelfAssemblyStatus::Matched { .. } => report.self_assembly_matched += 1,
                SelfAssemblyStatus::NotFound => report.self_assembly_not_found += 1,
                SelfAssemblyStatus::BridgeUnresolved => report.bridge_unresolved += 1,
            }

            records.push(UnifiedRecord {
                key: key.clone(),
                sequence: physchem_row.and_then(|row| row.sequence.clone()),
                c_terminus: physchem_row.and_then(|row| row.c_terminus.clone()),
                physchem: physchem_row.map(|row| row.properties.clone()),
                activity,
                lipophilicity: lipophilicity_row.map(LipophilicityFields::from_row),
                self_assembly: status,
            });
        }

        report.peptides = records.len();
        report.organisms = organisms.len();
        tracing::info!(
            peptides = report.peptides,
            organisms = report.organisms,
            conflicts = report.conflicts.len(),
            rejected = report.rejected.len(),
            bridge_unresolved = report.bridge_unresolved,
            "merged sources"
        );

        let table = UnifiedTable {
            physchem_columns: physchem.property_columns.clone(),
            lipophilicity_columns: lipophilicity.extra_columns.clone(),
            organisms,
            records,
        };
        Ok((table, report))
    }

    fn sequence_rows<'a>(&self, rows: &'a [PhyschemRow]) -> BTreeMap<PeptideKey, &'a PhyschemRow> {
        let mut found = BTreeMap::new();
        for row in rows.iter().filter(|row| has_sequence(row)) {
            if let Ok(key) = self.resolver.resolve(row.raw_id(), row.n_terminus()) {
                found.entry(key).or_insert(row);
            }
        }
        found
    }

    // First occurrence of each key wins; later rows are recorded as conflicts.
    fn index<'a, R>(
        &self,
        source: SourceKind,
        rows: &'a [R],
        report: &mut MergeReport,
    ) -> BTreeMap<PeptideKey, (usize, &'a R)>
    where
        R: KeyedRow + PartialEq,
    {
        let mut index = BTreeMap::new();
        for (position, row) in rows.iter().enumerate() {
            let key = match self.resolver.resolve(row.raw_id(), row.n_terminus()) {
                Ok(key) => key,
                Err(err) => {
                    tracing::warn!(%source, row = position, raw_id = row.raw_id(), "rejected row");
                    report.rejected.push(RejectedRow {
                        row: RowRef::new(source, position),
                        raw_id: row.raw_id().to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            match index.get(&key) {
                Some(&(kept, kept_row)) => {
                    tracing::debug!(%source, %key, kept, discarded = position, "duplicate key");
                    report.conflicts.push(KeyConflict {
                        source,
                        key,
                        kept: RowRef::new(source, kept),
                        discarded: RowRef::new(source, position),
                        identical: kept_row == row,
                    });
                }
                None => {
                    index.insert(key, (position, row));
                }
            }
        }
        index
    }
}

fn has_sequence(row: &PhyschemRow) -> bool {
    row.sequence
        .as_deref()
        .is_some_and(|sequence| !sequence.trim().is_empty())
}

fn bridge_self_assembly(
    key: &PeptideKey,
    physchem: Option<&PhyschemRow>,
    table: &SelfAssemblyTable,
) -> SelfAssemblyStatus {
    let Some(row) = physchem else {
        return SelfAssemblyStatus::BridgeUnresolved;
    };
    let Some(sequence) = row.sequence.as_deref().filter(|seq| !seq.trim().is_empty()) else {
        return SelfAssemblyStatus::BridgeUnresolved;
    };
    let n_terminus = key.n_terminus();
    let c_terminus = row.c_terminus.as_deref().unwrap_or("");

    let record = table.get(sequence, n_terminus).or_else(|| {
        cluster_sequence(sequence, n_terminus, c_terminus)
            .and_then(|encoded| table.get(&encoded, n_terminus))
    });
    match record {
        Some(record) => SelfAssemblyStatus::Matched {
            free_energy: record.free_energy,
            npol: record.npol,
            curvature: record.curvature,
        },
        None => SelfAssemblyStatus::NotFound,
    }
}

fn pass_through(source: SourceKind, columns: &[String], taken: &[String]) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            if taken.iter().any(|name| name.eq_ignore_ascii_case(column)) {
                format!("{source}: {column}")
            } else {
                column.clone()
            }
        })
        .collect()
}

impl UnifiedRecord {
    pub fn activity_for(&self, organism: &str) -> Option<&ActivitySummary> {
        self.activity
            .iter()
            .find(|summary| summary.organism == organism && summary.provenance != Provenance::Absent)
    }
}

impl LipophilicityFields {
    pub fn from_row(row: &LipophilicityRow) -> Self {
        Self {
            smiles: row.smiles.clone(),
            log_p: row.log_p.clone(),
            log_d: row.log_d.clone(),
            extras: row.extras.clone(),
        }
    }
}
