use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::activity::{self, ActivitySummary};
use crate::config::EngineConfig;
use crate::domain::{IdentityResolver, PeptideKey, Qualifier, RowRef, SourceKind};
use crate::error::UnifyError;
use crate::mass;
use crate::merge::{MergeReport, RejectedRow, SourceMerger, UnifiedTable};
use crate::self_assembly::{self, ParseReport, SelfAssemblyTable};
use crate::tables::{ActivityRow, ActivityTable, LipophilicityTable, PhyschemTable};
use crate::units::{
    self, ActivityMeasurement, Conversion, NormalizedMeasurement, UnconvertibleReason,
};

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub physchem: Option<PhyschemTable>,
    pub activity: Option<ActivityTable>,
    pub lipophilicity: Option<LipophilicityTable>,
    pub self_assembly: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeightSources {
    pub column: usize,
    pub computed: usize,
    pub activity_sequence: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityReport {
    pub rows: usize,
    pub filtered: usize,
    pub rejected: Vec<RejectedRow>,
    pub normalized: usize,
    pub unconvertible: BTreeMap<UnconvertibleReason, usize>,
    pub summaries: usize,
    pub molecular_weight: WeightSources,
}

impl ActivityReport {
    pub fn unconvertible_total(&self) -> usize {
        self.unconvertible.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub activity: ActivityReport,
    pub self_assembly: ParseReport,
    pub merge: MergeReport,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: UnifiedTable,
    pub summaries: Vec<ActivitySummary>,
    pub report: RunReport,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: EngineConfig,
    resolver: IdentityResolver,
}

impl Pipeline {
    pub fn new(config: EngineConfig) -> Self {
        let resolver = IdentityResolver::new(config.default_prefix.as_deref());
        Self { config, resolver }
    }

    pub fn run(
        &self,
        inputs: &PipelineInputs,
        sink: &dyn ProgressSink,
    ) -> Result<PipelineOutput, UnifyError> {
        let started = Instant::now();
        let physchem = inputs
            .physchem
            .as_ref()
            .ok_or(UnifyError::MissingRequiredSource(SourceKind::Physchem))?;
        let lipophilicity = inputs
            .lipophilicity
            .as_ref()
            .ok_or(UnifyError::MissingRequiredSource(SourceKind::Lipophilicity))?;

        sink.event(ProgressEvent {
            message: "phase=Normalize; converting activity to µM".to_string(),
            elapsed: Some(started.elapsed()),
        });
        let (summaries, activity_report) = match &inputs.activity {
            Some(activity) => self.summarize(activity, Some(physchem)),
            None => {
                tracing::info!("no activity table supplied");
                (Vec::new(), ActivityReport::default())
            }
        };

        sink.event(ProgressEvent {
            message: "phase=Parse; reading self-assembly descriptors".to_string(),
            elapsed: Some(started.elapsed()),
        });
        let (assembly, parse_report) = match &inputs.self_assembly {
            Some(text) => self_assembly::parse(text, &self.config.comment_marker),
            None => (SelfAssemblyTable::default(), ParseReport::default()),
        };

        sink.event(ProgressEvent {
            message: "phase=Merge; joining sources".to_string(),
            elapsed: Some(started.elapsed()),
        });
        let merger = SourceMerger::new(self.resolver.clone());
        let (table, merge_report) =
            merger.merge(Some(physchem), &summaries, Some(lipophilicity), &assembly)?;

        sink.event(ProgressEvent {
            message: format!("phase=Done; {} peptides", table.records.len()),
            elapsed: Some(started.elapsed()),
        });

        Ok(PipelineOutput {
            table,
            summaries,
            report: RunReport {
                activity: activity_report,
                self_assembly: parse_report,
                merge: merge_report,
            },
        })
    }

    pub fn summarize(
        &self,
        activity: &ActivityTable,
        physchem: Option<&PhyschemTable>,
    ) -> (Vec<ActivitySummary>, ActivityReport) {
        let (normalized, mut report) = self.normalize_activity(activity, physchem);
        let summaries = activity::aggregate_by(&normalized, self.config.organism_grouping);
        report.summaries = summaries.len();
        tracing::info!(
            rows = report.rows,
            normalized = report.normalized,
            unconvertible = report.unconvertible_total(),
            summaries = report.summaries,
            "summarized activity"
        );
        (summaries, report)
    }

    pub fn normalize_activity(
        &self,
        activity: &ActivityTable,
        physchem: Option<&PhyschemTable>,
    ) -> (Vec<NormalizedMeasurement>, ActivityReport) {
        let weights = physchem
            .map(|table| self.weight_index(table))
            .unwrap_or_default();
        let mut report = ActivityReport {
            rows: activity.rows.len(),
            ..ActivityReport::default()
        };
        let mut normalized = Vec::with_capacity(activity.rows.len());

        for (position, row) in activity.rows.iter().enumerate() {
            let row_ref = RowRef::new(SourceKind::Activity, position);
            if !self.config.keeps_measure(row.measure.as_deref()) {
                report.filtered += 1;
                continue;
            }
            let key = match self.resolver.resolve(&row.raw_id, &row.n_terminus) {
                Ok(key) => key,
                Err(err) => {
                    tracing::warn!(row = position, raw_id = %row.raw_id, "rejected activity row");
                    report.rejected.push(RejectedRow {
                        row: row_ref,
                        raw_id: row.raw_id.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let molecular_weight = match weights.get(&key) {
                Some(WeightEntry::Column(weight)) => {
                    report.molecular_weight.column += 1;
                    Some(*weight)
                }
                Some(WeightEntry::Computed(weight)) => {
                    report.molecular_weight.computed += 1;
                    Some(*weight)
                }
                None => match row_weight(row, &key) {
                    Some(weight) => {
                        report.molecular_weight.activity_sequence += 1;
                        Some(weight)
                    }
                    None => {
                        report.molecular_weight.missing += 1;
                        None
                    }
                },
            };

            let measurement = measurement_from_row(row, key, row_ref);
            let result = units::normalize(measurement, molecular_weight);
            match result.conversion {
                Conversion::Micromolar(_) => report.normalized += 1,
                Conversion::Unconvertible(reason) => {
                    *report.unconvertible.entry(reason).or_default() += 1;
                }
            }
            normalized.push(result);
        }

        (normalized, report)
    }

    // First physchem row per key supplies the weight, as in the merge.
    fn weight_index(&self, physchem: &PhyschemTable) -> BTreeMap<PeptideKey, WeightEntry> {
        let mut index = BTreeMap::new();
        for row in &physchem.rows {
            let Ok(key) = self.resolver.resolve(&row.raw_id, &row.n_terminus) else {
                continue;
            };
            if index.contains_key(&key) {
                continue;
            }
            let column = physchem
                .property(row, &self.config.molecular_weight_column)
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|weight| weight.is_finite() && *weight > 0.0);
            let entry = match column {
                Some(weight) => WeightEntry::Column(weight),
                None => {
                    let sequence = row.sequence.as_deref().unwrap_or("");
                    let c_terminus = row.c_terminus.as_deref().unwrap_or("");
                    match mass::molecular_weight(sequence, key.n_terminus(), c_terminus) {
                        Some(weight) => WeightEntry::Computed(weight),
                        None => continue,
                    }
                }
            };
            index.insert(key, entry);
        }
        index
    }
}

#[derive(Debug, Clone, Copy)]
enum WeightEntry {
    Column(f64),
    Computed(f64),
}

fn row_weight(row: &ActivityRow, key: &PeptideKey) -> Option<f64> {
    let sequence = row.sequence.as_deref()?;
    mass::molecular_weight(
        sequence,
        key.n_terminus(),
        row.c_terminus.as_deref().unwrap_or(""),
    )
}

fn measurement_from_row(row: &ActivityRow, key: PeptideKey, row_ref: RowRef) -> ActivityMeasurement {
    let parsed = units::parse_concentration(&row.concentration);
    let explicit = row
        .qualifier
        .as_deref()
        .and_then(|symbol| Qualifier::from_symbol(symbol.trim()));
    ActivityMeasurement {
        key,
        organism: activity::canonical_organism(&row.organism),
        value: parsed.map(|parsed| parsed.value),
        unit: row.unit.trim().to_string(),
        qualifier: explicit.or(parsed.and_then(|parsed| parsed.qualifier)),
        row: row_ref,
    }
}

pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn event(&self, event: ProgressEvent) {
        let elapsed_ms = event.elapsed.map(|elapsed| elapsed.as_millis() as u64);
        tracing::debug!(elapsed_ms, "{}", event.message);
    }
}
