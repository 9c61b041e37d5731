use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{PeptideKey, Provenance, Qualifier};
use crate::units::{Conversion, NormalizedMeasurement};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganismGrouping {
    #[default]
    Strain,
    Species,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub key: PeptideKey,
    pub organism: String,
    pub value_um: Option<f64>,
    pub qualifier: Option<Qualifier>,
    pub provenance: Provenance,
    pub contributing: usize,
    pub total: usize,
}

impl ActivitySummary {
    pub fn absent(key: PeptideKey, organism: impl Into<String>) -> Self {
        Self {
            key,
            organism: organism.into(),
            value_um: None,
            qualifier: None,
            provenance: Provenance::Absent,
            contributing: 0,
            total: 0,
        }
    }
}

pub fn aggregate(measurements: &[NormalizedMeasurement]) -> Vec<ActivitySummary> {
    aggregate_by(measurements, OrganismGrouping::Strain)
}

/// Groups by (peptide, organism) and reduces each group.
///
/// The result is sorted by key then organism and does not depend on the
/// order of `measurements`.
pub fn aggregate_by(
    measurements: &[NormalizedMeasurement],
    grouping: OrganismGrouping,
) -> Vec<ActivitySummary> {
    let mut groups = BTreeMap::<(PeptideKey, String), Vec<&NormalizedMeasurement>>::new();
    for measurement in measurements {
        let organism = organism_label(&measurement.measurement.organism, grouping);
        groups
            .entry((measurement.measurement.key.clone(), organism))
            .or_default()
            .push(measurement);
    }

    groups
        .into_iter()
        .map(|((key, organism), group)| reduce_group(key, organism, &group))
        .collect()
}

fn reduce_group(
    key: PeptideKey,
    organism: String,
    group: &[&NormalizedMeasurement],
) -> ActivitySummary {
    let mut exact = Vec::new();
    let mut bounds = Vec::new();
    for item in group {
        let Conversion::Micromolar(micromolar) = item.conversion else {
            continue;
        };
        match item.measurement.qualifier {
            None => exact.push(ExactValue {
                raw: item.measurement.value.unwrap_or(micromolar),
                unit: item.measurement.unit.trim(),
                micromolar,
            }),
            Some(qualifier) => bounds.push((micromolar, qualifier)),
        }
    }

    let mut summary = ActivitySummary {
        total: group.len(),
        ..ActivitySummary::absent(key, organism)
    };

    if !exact.is_empty() {
        exact.sort_by(ExactValue::order);
        exact.dedup_by(|a, b| a.raw.total_cmp(&b.raw).is_eq() && a.unit == b.unit);
        let mut values: Vec<f64> = exact.iter().map(|value| value.micromolar).collect();
        values.sort_by(f64::total_cmp);
        summary.value_um = Some(geometric_mean(&values));
        summary.provenance = Provenance::Exact;
        summary.contributing = values.len();
    } else if let Some((value, qualifier)) = conservative_bound(&bounds) {
        summary.value_um = Some(value);
        summary.qualifier = Some(qualifier);
        summary.provenance = Provenance::QualifierBound;
        summary.contributing = distinct_bounds(&bounds, qualifier.is_upper_bound());
    } else if !group.is_empty() {
        summary.provenance = Provenance::Unconvertible;
    }
    summary
}

struct ExactValue<'a> {
    raw: f64,
    unit: &'a str,
    micromolar: f64,
}

impl ExactValue<'_> {
    fn order(a: &Self, b: &Self) -> Ordering {
        a.raw
            .total_cmp(&b.raw)
            .then_with(|| a.unit.cmp(b.unit))
            .then_with(|| a.micromolar.total_cmp(&b.micromolar))
    }
}

// `values` must be sorted so the floating-point sum is order independent.
fn geometric_mean(values: &[f64]) -> f64 {
    if let [single] = values {
        return *single;
    }
    let log_sum: f64 = values.iter().map(|value| value.ln()).sum();
    (log_sum / values.len() as f64).exp()
}

/// Upper bounds win over lower bounds: the tightest `<`/`≤` when any exists,
/// otherwise the largest `>`/`≥`. Strict qualifiers win ties.
fn conservative_bound(bounds: &[(f64, Qualifier)]) -> Option<(f64, Qualifier)> {
    let strict_first = |a: &Qualifier, b: &Qualifier| b.is_strict().cmp(&a.is_strict());
    let upper = bounds
        .iter()
        .filter(|(_, qualifier)| qualifier.is_upper_bound())
        .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| strict_first(&a.1, &b.1)));
    if let Some(bound) = upper {
        return Some(*bound);
    }
    bounds
        .iter()
        .filter(|(_, qualifier)| !qualifier.is_upper_bound())
        .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| strict_first(&b.1, &a.1)))
        .copied()
}

fn distinct_bounds(bounds: &[(f64, Qualifier)], upper: bool) -> usize {
    let mut same_side: Vec<(f64, Qualifier)> = bounds
        .iter()
        .copied()
        .filter(|(_, qualifier)| qualifier.is_upper_bound() == upper)
        .collect();
    same_side.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.symbol().cmp(b.1.symbol())));
    same_side.dedup_by(|a, b| a.0.total_cmp(&b.0).is_eq() && a.1 == b.1);
    same_side.len()
}

pub fn canonical_organism(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn organism_label(name: &str, grouping: OrganismGrouping) -> String {
    match grouping {
        OrganismGrouping::Strain => canonical_organism(name),
        OrganismGrouping::Species => split_organism(name).0,
    }
}

pub fn split_organism(name: &str) -> (String, Option<String>) {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let strain_start = tokens.iter().enumerate().skip(1).find_map(|(index, token)| {
        token
            .chars()
            .next()
            .filter(|ch| ch.is_uppercase() || ch.is_ascii_digit())
            .map(|_| index)
    });
    match strain_start {
        Some(index) => (tokens[..index].join(" "), Some(tokens[index..].join(" "))),
        None => (tokens.join(" "), None),
    }
}
