use std::fs;
use std::sync::Mutex;

use serde_json::{Value, json};

use peptide_unify::config::FetchConfig;
use peptide_unify::dbaasp::{
    PeptideCard, PeptideCardClient, extract_activity, extract_physchem, fetch_all,
};
use peptide_unify::error::UnifyError;

fn fixture_card() -> PeptideCard {
    let raw = fs::read_to_string("tests/fixtures/dbaasp_card_51.json").unwrap();
    let raw_json: Value = serde_json::from_str(&raw).unwrap();
    PeptideCard { id: 51, raw_json }
}

#[derive(Default)]
struct MockClient {
    calls: Mutex<Vec<u64>>,
}

impl PeptideCardClient for MockClient {
    fn fetch(&self, id: u64) -> Result<PeptideCard, UnifyError> {
        self.calls.lock().unwrap().push(id);
        match id {
            51 => Ok(fixture_card()),
            52 => Ok(PeptideCard {
                id,
                raw_json: json!({
                    "id": 52,
                    "sequence": "GIGK",
                    "nTerminus": null,
                    "physicoChemicalProperties": [
                        {"name": "Net Charge", "value": "2"},
                        {"name": "Hydrophobicity", "value": "-0.4"}
                    ]
                }),
            }),
            _ => Err(UnifyError::DbaaspStatus {
                status: 404,
                message: "not found".to_string(),
            }),
        }
    }
}

#[test]
fn extract_physchem_from_card() {
    let table = extract_physchem(&[fixture_card()], None).unwrap();
    assert_eq!(
        table.property_columns,
        vec![
            "Normalized Hydrophobic Moment",
            "Net Charge",
            "Isoelectric Point",
            "Molecular Weight"
        ]
    );
    let row = &table.rows[0];
    assert_eq!(row.raw_id, "51");
    assert_eq!(row.n_terminus, "C16");
    assert_eq!(row.sequence.as_deref(), Some("KLAKLAKKLAKLAK"));
    assert_eq!(row.c_terminus.as_deref(), Some("AMD"));
    assert_eq!(table.property(row, "Net Charge"), Some("5"));
    assert_eq!(table.property(row, "Isoelectric Point"), Some("11.02"));
}

#[test]
fn net_charge_override_terminus() {
    let table = extract_physchem(&[fixture_card()], Some("ACT")).unwrap();
    assert_eq!(table.property(&table.rows[0], "Net Charge"), Some("6.0"));
}

#[test]
fn extract_activity_flattens_named_values() {
    let table = extract_activity(&[fixture_card()]).unwrap();
    assert_eq!(table.rows.len(), 2);
    let first = &table.rows[0];
    assert_eq!(first.organism, "Escherichia coli ATCC 25922");
    assert_eq!(first.measure.as_deref(), Some("MIC"));
    assert_eq!(first.concentration, "8.8115");
    assert_eq!(first.unit, "µg/ml");
    assert_eq!(first.sequence.as_deref(), Some("KLAKLAKKLAKLAK"));
    assert_eq!(table.rows[1].concentration, ">64");
}

#[test]
fn fetch_all_collects_failures() {
    let client = MockClient::default();
    let output = fetch_all(&client, &[51, 404, 52], None).unwrap();

    assert_eq!(*client.calls.lock().unwrap(), vec![51, 404, 52]);
    assert_eq!(output.report.requested, 3);
    assert_eq!(output.report.fetched, 2);
    assert_eq!(output.report.failures.len(), 1);
    assert_eq!(output.report.failures[0].id, 404);

    assert_eq!(output.physchem.rows.len(), 2);
    assert_eq!(
        output.physchem.property_columns,
        vec![
            "Normalized Hydrophobic Moment",
            "Net Charge",
            "Isoelectric Point",
            "Molecular Weight",
            "Hydrophobicity"
        ]
    );
    let second = &output.physchem.rows[1];
    assert_eq!(second.n_terminus, "");
    assert_eq!(output.physchem.property(second, "Net Charge"), Some("2"));
    assert_eq!(output.physchem.property(second, "Molecular Weight"), None);
    assert_eq!(output.activity.rows.len(), 2);
}

#[test]
fn non_object_card_is_rejected() {
    let card = PeptideCard {
        id: 3,
        raw_json: json!([1, 2, 3]),
    };
    assert!(matches!(
        extract_physchem(&[card], None),
        Err(UnifyError::InvalidCard(_))
    ));
}

#[test]
fn peptide_url_template() {
    let config = FetchConfig {
        api_url: "http://localhost:8080/api/{id}/card".to_string(),
        ..FetchConfig::default()
    };
    assert_eq!(config.peptide_url(838), "http://localhost:8080/api/838/card");
}
