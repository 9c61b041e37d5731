use proptest::prelude::*;

use peptide_unify::activity::{OrganismGrouping, aggregate, aggregate_by};
use peptide_unify::domain::{Provenance, Qualifier, RowRef, SourceKind, resolve};
use peptide_unify::units::{ActivityMeasurement, NormalizedMeasurement, normalize};

fn measure(
    id: &str,
    organism: &str,
    value: Option<f64>,
    unit: &str,
    qualifier: Option<Qualifier>,
) -> NormalizedMeasurement {
    normalize(
        ActivityMeasurement {
            key: resolve(id, "C16").unwrap(),
            organism: organism.to_string(),
            value,
            unit: unit.to_string(),
            qualifier,
            row: RowRef::new(SourceKind::Activity, 0),
        },
        Some(2000.0),
    )
}

#[test]
fn upper_bounds_scenario() {
    let summaries = aggregate(&[
        measure("12", "E. coli", Some(10.0), "µM", Some(Qualifier::Lt)),
        measure("12", "E. coli", Some(5.0), "µM", Some(Qualifier::Lt)),
    ]);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].value_um, Some(5.0));
    assert_eq!(summaries[0].provenance, Provenance::QualifierBound);
    assert_eq!(summaries[0].contributing, 2);
}

#[test]
fn exact_values_beat_bounds() {
    let summaries = aggregate(&[
        measure("12", "E. coli", Some(1.0), "µM", Some(Qualifier::Lt)),
        measure("12", "E. coli", Some(4.0), "µM", None),
        measure("12", "E. coli", Some(16.0), "µM", None),
    ]);
    assert_eq!(summaries[0].provenance, Provenance::Exact);
    let value = summaries[0].value_um.unwrap();
    assert!((value - 8.0).abs() < 1e-12);
    assert_eq!(summaries[0].qualifier, None);
}

#[test]
fn all_unconvertible_group() {
    let summaries = aggregate(&[
        measure("12", "E. coli", None, "µM", None),
        measure("12", "E. coli", Some(3.0), "%", None),
    ]);
    assert_eq!(summaries[0].provenance, Provenance::Unconvertible);
    assert_eq!(summaries[0].value_um, None);
    assert_eq!(summaries[0].contributing, 0);
    assert_eq!(summaries[0].total, 2);
}

#[test]
fn empty_input_has_no_summaries() {
    assert!(aggregate(&[]).is_empty());
}

#[test]
fn species_grouping_merges_strains() {
    let measurements = [
        measure("12", "Escherichia coli ATCC 25922", Some(2.0), "µM", None),
        measure("12", "Escherichia coli K12", Some(8.0), "µM", None),
    ];
    assert_eq!(aggregate(&measurements).len(), 2);

    let by_species = aggregate_by(&measurements, OrganismGrouping::Species);
    assert_eq!(by_species.len(), 1);
    assert_eq!(by_species[0].organism, "Escherichia coli");
    assert!((by_species[0].value_um.unwrap() - 4.0).abs() < 1e-12);
}

fn arb_measurement() -> impl Strategy<Value = NormalizedMeasurement> {
    (
        prop::sample::select(vec!["1", "2", "3"]),
        prop::sample::select(vec!["E. coli", "S. aureus"]),
        prop::option::weighted(0.9, 0.5f64..512.0),
        prop::sample::select(vec!["µM", "µg/mL", "nM", "%"]),
        prop::option::of(prop::sample::select(vec![
            Qualifier::Lt,
            Qualifier::Le,
            Qualifier::Gt,
            Qualifier::Ge,
        ])),
    )
        .prop_map(|(id, organism, value, unit, qualifier)| {
            measure(id, organism, value, unit, qualifier)
        })
}

proptest! {
    #[test]
    fn aggregation_ignores_input_order(
        (measurements, shuffled) in prop::collection::vec(arb_measurement(), 0..24)
            .prop_flat_map(|items| {
                let shuffled = Just(items.clone()).prop_shuffle();
                (Just(items), shuffled)
            })
    ) {
        prop_assert_eq!(aggregate(&measurements), aggregate(&shuffled));
    }
}
