use camino::Utf8Path;

use peptide_unify::config::EngineConfig;
use peptide_unify::domain::{Provenance, Qualifier};
use peptide_unify::error::UnifyError;
use peptide_unify::fs_util;
use peptide_unify::merge::SelfAssemblyStatus;
use peptide_unify::pipeline::{
    Pipeline, PipelineInputs, PipelineOutput, ProgressEvent, ProgressSink,
};
use peptide_unify::tables::{ActivityTable, LipophilicityTable, PhyschemTable, RawTable};
use peptide_unify::units::UnconvertibleReason;

struct NullSink;

impl ProgressSink for NullSink {
    fn event(&self, _event: ProgressEvent) {}
}

fn fixture_inputs() -> PipelineInputs {
    let table = |name: &str| fs_util::read_table(Utf8Path::new(&format!("tests/fixtures/{name}"))).unwrap();
    PipelineInputs {
        physchem: Some(PhyschemTable::from_raw(&table("physchem.csv")).unwrap()),
        activity: Some(ActivityTable::from_raw(&table("activity.csv")).unwrap()),
        lipophilicity: Some(LipophilicityTable::from_raw(&table("lipophilicity.csv")).unwrap()),
        self_assembly: Some(
            fs_util::read_text(Utf8Path::new("tests/fixtures/self_assembly.txt")).unwrap(),
        ),
    }
}

fn run_fixtures() -> PipelineOutput {
    Pipeline::new(EngineConfig::default())
        .run(&fixture_inputs(), &NullSink)
        .unwrap()
}

#[test]
fn one_row_per_peptide_in_key_order() {
    let output = run_fixtures();
    let ids: Vec<String> = output
        .table
        .records
        .iter()
        .map(|record| record.key.id_string())
        .collect();
    assert_eq!(
        ids,
        vec!["DBAASPS_7", "DBAASPS_101", "DBAASPS_102", "DBAASPS_103", "DBAASPS_104"]
    );
    assert_eq!(
        output.table.organisms,
        vec!["Escherichia coli ATCC 25922", "Staphylococcus aureus"]
    );
}

#[test]
fn activity_is_summarized_per_organism() {
    let output = run_fixtures();
    let records = &output.table.records;

    let coli = records[1].activity_for("Escherichia coli ATCC 25922").unwrap();
    assert_eq!(coli.provenance, Provenance::Exact);
    assert!((coli.value_um.unwrap() - 5.0).abs() < 1e-9);
    assert_eq!(coli.contributing, 1);
    assert_eq!(coli.total, 2);

    let aureus = records[1].activity_for("Staphylococcus aureus").unwrap();
    assert_eq!(aureus.value_um, Some(5.0));
    assert_eq!(aureus.qualifier, Some(Qualifier::Lt));

    let exact_wins = records[2].activity_for("Escherichia coli ATCC 25922").unwrap();
    assert_eq!(exact_wins.value_um, Some(12.0));
    assert_eq!(exact_wins.provenance, Provenance::Exact);

    let lower = records[3].activity_for("Staphylococcus aureus").unwrap();
    assert_eq!(lower.value_um, Some(64.0));
    assert_eq!(lower.qualifier, Some(Qualifier::Gt));

    assert!(records[0].activity_for("Staphylococcus aureus").is_none());
    assert_eq!(records[0].activity[1].provenance, Provenance::Absent);
}

#[test]
fn reports_tally_recovered_conditions() {
    let report = run_fixtures().report;

    assert_eq!(report.activity.rows, 10);
    assert_eq!(report.activity.rejected.len(), 1);
    assert_eq!(
        report.activity.unconvertible.get(&UnconvertibleReason::NoNumericValue),
        Some(&1)
    );
    assert_eq!(report.activity.molecular_weight.column, 6);
    assert_eq!(report.activity.molecular_weight.computed, 2);
    assert_eq!(report.activity.molecular_weight.activity_sequence, 1);

    assert_eq!(report.self_assembly.lines, 8);
    assert_eq!(report.self_assembly.parsed, 4);
    assert_eq!(report.self_assembly.skipped, 4);
    assert_eq!(report.self_assembly.overwritten, 1);

    assert_eq!(report.merge.peptides, 5);
    assert_eq!(report.merge.conflicts.len(), 1);
    assert_eq!(report.merge.conflicts[0].discarded.row, 4);
    assert_eq!(report.merge.orphan_summaries, 1);
    assert_eq!(report.merge.missing_physchem, 1);
    assert_eq!(report.merge.missing_lipophilicity, 1);
    assert_eq!(report.merge.self_assembly_matched, 3);
    assert_eq!(report.merge.bridge_unresolved, 2);
}

#[test]
fn self_assembly_bridges_plain_and_encoded_sequences() {
    let records = run_fixtures().table.records;
    assert_eq!(records[0].self_assembly, SelfAssemblyStatus::BridgeUnresolved);
    assert_eq!(
        records[1].self_assembly,
        SelfAssemblyStatus::Matched {
            free_energy: -18.42,
            npol: 62.0,
            curvature: 0.031
        }
    );
    assert_eq!(
        records[2].self_assembly,
        SelfAssemblyStatus::Matched {
            free_energy: -10.05,
            npol: 26.0,
            curvature: 0.108
        }
    );
    assert_eq!(records[4].self_assembly, SelfAssemblyStatus::BridgeUnresolved);
}

#[test]
fn missing_lipophilicity_row_is_explicitly_empty() {
    let output = run_fixtures();
    let header = output.table.header();
    let rows = output.table.rows("NA");
    let column = |name: &str| header.iter().position(|h| h == name).unwrap();

    assert_eq!(header.len(), 25);
    assert!(rows.iter().all(|row| row.len() == header.len()));
    assert_eq!(rows[0][column("Peptide ID")], "DBAASPS_7");
    assert_eq!(rows[0][column("logP")], "NA");
    assert_eq!(rows[0][column("logD")], "NA");
    assert_eq!(rows[0][column("SMILES")], "NA");
    assert_eq!(rows[0][column("self_assembly_status")], "bridge-unresolved");
    assert_eq!(rows[4][column("Net Charge")], "NA");
    assert_eq!(rows[4][column("logP")], "5.01");
}

#[test]
fn rerun_is_byte_identical() {
    let render = || {
        let mut bytes = Vec::new();
        run_fixtures().table.to_raw("").write_csv(&mut bytes).unwrap();
        bytes
    };
    assert_eq!(render(), render());
}

#[test]
fn unified_table_round_trips_through_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("unified.csv")).unwrap();
    let table = run_fixtures().table.to_raw("");
    fs_util::write_table_atomic(&path, &table).unwrap();
    let read_back = fs_util::read_table(&path).unwrap();
    assert_eq!(read_back, table);
}

#[test]
fn missing_lipophilicity_table_is_fatal() {
    let mut inputs = fixture_inputs();
    inputs.lipophilicity = None;
    let err = Pipeline::new(EngineConfig::default())
        .run(&inputs, &NullSink)
        .unwrap_err();
    assert!(matches!(err, UnifyError::MissingRequiredSource(_)));
}

#[test]
fn activity_header_aliases() {
    let raw = RawTable::from_reader(
        "ID,N TERMINUS,Target Species,value,units\n5,C16,E. coli,4,uM\n".as_bytes(),
    )
    .unwrap();
    let activity = ActivityTable::from_raw(&raw).unwrap();
    assert_eq!(activity.rows[0].organism, "E. coli");
    assert_eq!(activity.rows[0].concentration, "4");
}
