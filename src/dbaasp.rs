use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::Value;

use crate::config::FetchConfig;
use crate::error::UnifyError;
use crate::tables::{ActivityRow, ActivityTable, PhyschemRow, PhyschemTable};

const BASE_DELAY_MS: u64 = 200;

#[derive(Debug, Clone)]
pub struct PeptideCard {
    pub id: u64,
    pub raw_json: Value,
}

pub trait PeptideCardClient: Send + Sync {
    fn fetch(&self, id: u64) -> Result<PeptideCard, UnifyError>;
}

#[derive(Clone)]
pub struct DbaaspHttpClient {
    client: Client,
    config: FetchConfig,
}

impl DbaaspHttpClient {
    pub fn new(config: FetchConfig) -> Result<Self, UnifyError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("peptide-unify/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| UnifyError::DbaaspHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|err| UnifyError::DbaaspHttp(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, UnifyError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        let max_retries = self.config.max_retries as usize;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < max_retries && is_retryable_status(status) {
                        tracing::debug!(status, attempt, "retrying DBAASP request");
                        backoff(attempt);
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < max_retries && is_retryable_error(&err) {
                        tracing::debug!(error = %err, attempt, "retrying DBAASP request");
                        backoff(attempt);
                        attempt += 1;
                        continue;
                    }
                    return Err(UnifyError::DbaaspHttp(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, UnifyError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "DBAASP request failed".to_string());
        Err(UnifyError::DbaaspStatus { status, message })
    }
}

impl PeptideCardClient for DbaaspHttpClient {
    fn fetch(&self, id: u64) -> Result<PeptideCard, UnifyError> {
        let url = self.config.peptide_url(id);
        let response = self.send_with_retries(|| self.client.get(&url))?;
        let response = Self::handle_status(response)?;
        let raw_json: Value = response
            .json()
            .map_err(|err| UnifyError::DbaaspHttp(err.to_string()))?;
        Ok(PeptideCard { id, raw_json })
    }
}

fn backoff(attempt: usize) {
    let delay = BASE_DELAY_MS * (attempt as u64 + 1);
    std::thread::sleep(Duration::from_millis(delay));
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    pub id: u64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub requested: usize,
    pub fetched: usize,
    pub failures: Vec<FetchFailure>,
    pub physchem_rows: usize,
    pub activity_rows: usize,
    pub fetched_at: String,
}

#[derive(Debug, Clone)]
pub struct FetchOutput {
    pub physchem: PhyschemTable,
    pub activity: ActivityTable,
    pub report: FetchReport,
}

pub fn fetch_all(
    client: &dyn PeptideCardClient,
    ids: &[u64],
    n_terminus_override: Option<&str>,
) -> Result<FetchOutput, UnifyError> {
    let mut cards = Vec::with_capacity(ids.len());
    let mut failures = Vec::new();
    for (index, id) in ids.iter().enumerate() {
        tracing::info!(id, progress = %format!("{}/{}", index + 1, ids.len()), "fetching peptide card");
        match client.fetch(*id) {
            Ok(card) => cards.push(card),
            Err(err) => {
                tracing::warn!(id, error = %err, "peptide card fetch failed");
                failures.push(FetchFailure {
                    id: *id,
                    message: err.to_string(),
                });
            }
        }
    }

    let physchem = extract_physchem(&cards, n_terminus_override)?;
    let activity = extract_activity(&cards)?;
    let report = FetchReport {
        requested: ids.len(),
        fetched: cards.len(),
        failures,
        physchem_rows: physchem.rows.len(),
        activity_rows: activity.rows.len(),
        fetched_at: chrono::Utc::now().to_rfc3339(),
    };
    Ok(FetchOutput {
        physchem,
        activity,
        report,
    })
}

struct CardIdentity {
    raw_id: String,
    n_terminus: String,
    sequence: Option<String>,
    c_terminus: Option<String>,
}

fn card_identity(card: &PeptideCard) -> Result<CardIdentity, UnifyError> {
    let raw = &card.raw_json;
    if !raw.is_object() {
        return Err(UnifyError::InvalidCard(format!(
            "peptide {} is not a JSON object",
            card.id
        )));
    }
    let raw_id = match raw.get("id") {
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(text)) => text.trim().to_string(),
        _ => card.id.to_string(),
    };
    Ok(CardIdentity {
        raw_id,
        n_terminus: named(raw.get("nTerminus")).unwrap_or_default(),
        sequence: raw
            .get("sequence")
            .and_then(|v| v.as_str())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        c_terminus: named(raw.get("cTerminus")),
    })
}

pub fn extract_physchem(
    cards: &[PeptideCard],
    n_terminus_override: Option<&str>,
) -> Result<PhyschemTable, UnifyError> {
    let mut property_columns: Vec<String> = Vec::new();
    let mut per_card = Vec::with_capacity(cards.len());
    for card in cards {
        let identity = card_identity(card)?;
        let lipidated = n_terminus_override
            .unwrap_or(&identity.n_terminus)
            .trim()
            .to_uppercase()
            .starts_with('C');
        let mut values: Vec<(String, String)> = Vec::new();
        let properties = card
            .raw_json
            .get("physicoChemicalProperties")
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();
        for property in properties {
            let name = property
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .unwrap_or("");
            if name.is_empty() || name.eq_ignore_ascii_case("ID") {
                continue;
            }
            let mut value = scalar_text(property.get("value"));
            if name == "Net Charge" && lipidated {
                if let Ok(charge) = value.parse::<f64>() {
                    value = (charge - 1.0).to_string();
                }
            }
            if !property_columns.iter().any(|column| column == name) {
                property_columns.push(name.to_string());
            }
            values.push((name.to_string(), value));
        }
        per_card.push((identity, values));
    }

    let rows = per_card
        .into_iter()
        .map(|(identity, values)| PhyschemRow {
            raw_id: identity.raw_id,
            n_terminus: identity.n_terminus,
            sequence: identity.sequence,
            c_terminus: identity.c_terminus,
            properties: property_columns
                .iter()
                .map(|column| {
                    values
                        .iter()
                        .rev()
                        .find(|(name, _)| name == column)
                        .map(|(_, value)| value.clone())
                        .unwrap_or_default()
                })
                .collect(),
        })
        .collect();

    Ok(PhyschemTable {
        property_columns,
        rows,
    })
}

pub fn extract_activity(cards: &[PeptideCard]) -> Result<ActivityTable, UnifyError> {
    let mut rows = Vec::new();
    for card in cards {
        let identity = card_identity(card)?;
        let activities = card
            .raw_json
            .get("targetActivities")
            .filter(|v| !v.is_null())
            .or_else(|| card.raw_json.get("activityAgainstTargetSpecies"))
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();
        for entry in activities {
            rows.push(ActivityRow {
                raw_id: identity.raw_id.clone(),
                n_terminus: identity.n_terminus.clone(),
                organism: scalar_text(entry.get("targetSpecies")),
                concentration: scalar_text(entry.get("concentration")),
                unit: scalar_text(entry.get("unit")),
                qualifier: None,
                measure: Some(scalar_text(entry.get("activityMeasureGroup")))
                    .filter(|measure| !measure.is_empty()),
                sequence: identity.sequence.clone(),
                c_terminus: identity.c_terminus.clone(),
            });
        }
    }
    Ok(ActivityTable { rows })
}

fn named(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::Object(map) => map.get("name").and_then(|v| v.as_str())?.to_string(),
        Value::String(text) => text.clone(),
        _ => return None,
    };
    Some(text.trim().to_string()).filter(|text| !text.is_empty())
}

fn scalar_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Object(_)) => named(value).unwrap_or_default(),
        Some(other) => other.to_string(),
    }
}
