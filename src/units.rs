use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{PeptideKey, Qualifier, RowRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConcentrationUnit {
    NanogramPerMl,
    MicrogramPerMl,
    MilligramPerMl,
    Nanomolar,
    Micromolar,
    Millimolar,
    Molar,
}

impl ConcentrationUnit {
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .map(|ch| if ch == 'µ' || ch == 'μ' { 'u' } else { ch })
            .collect();
        match normalized.as_str() {
            "ng/ml" => Some(ConcentrationUnit::NanogramPerMl),
            "ug/ml" | "mg/l" => Some(ConcentrationUnit::MicrogramPerMl),
            "mg/ml" | "g/l" => Some(ConcentrationUnit::MilligramPerMl),
            "nm" => Some(ConcentrationUnit::Nanomolar),
            "um" => Some(ConcentrationUnit::Micromolar),
            "mm" => Some(ConcentrationUnit::Millimolar),
            "m" => Some(ConcentrationUnit::Molar),
            _ => None,
        }
    }

    pub fn mass_factor(self) -> Option<f64> {
        match self {
            ConcentrationUnit::NanogramPerMl => Some(1.0),
            ConcentrationUnit::MicrogramPerMl => Some(1_000.0),
            ConcentrationUnit::MilligramPerMl => Some(1_000_000.0),
            _ => None,
        }
    }

    pub fn molar_exponent(self) -> Option<i32> {
        match self {
            ConcentrationUnit::Nanomolar => Some(-3),
            ConcentrationUnit::Micromolar => Some(0),
            ConcentrationUnit::Millimolar => Some(3),
            ConcentrationUnit::Molar => Some(6),
            _ => None,
        }
    }
}

impl fmt::Display for ConcentrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConcentrationUnit::NanogramPerMl => "ng/mL",
            ConcentrationUnit::MicrogramPerMl => "µg/mL",
            ConcentrationUnit::MilligramPerMl => "mg/mL",
            ConcentrationUnit::Nanomolar => "nM",
            ConcentrationUnit::Micromolar => "µM",
            ConcentrationUnit::Millimolar => "mM",
            ConcentrationUnit::Molar => "M",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityMeasurement {
    pub key: PeptideKey,
    pub organism: String,
    pub value: Option<f64>,
    pub unit: String,
    pub qualifier: Option<Qualifier>,
    pub row: RowRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnconvertibleReason {
    NoNumericValue,
    NonPositiveValue,
    UnknownUnit,
    MissingMolecularWeight,
}

impl fmt::Display for UnconvertibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnconvertibleReason::NoNumericValue => write!(f, "no numeric value"),
            UnconvertibleReason::NonPositiveValue => write!(f, "non-positive value"),
            UnconvertibleReason::UnknownUnit => write!(f, "unknown unit"),
            UnconvertibleReason::MissingMolecularWeight => write!(f, "missing molecular weight"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status", content = "value")]
pub enum Conversion {
    Micromolar(f64),
    Unconvertible(UnconvertibleReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMeasurement {
    pub measurement: ActivityMeasurement,
    pub conversion: Conversion,
}

impl NormalizedMeasurement {
    pub fn micromolar(&self) -> Option<f64> {
        match self.conversion {
            Conversion::Micromolar(value) => Some(value),
            Conversion::Unconvertible(_) => None,
        }
    }
}

pub fn normalize(
    measurement: ActivityMeasurement,
    molecular_weight: Option<f64>,
) -> NormalizedMeasurement {
    let conversion = match measurement.value {
        None => Conversion::Unconvertible(UnconvertibleReason::NoNumericValue),
        Some(value) => match to_micromolar(value, &measurement.unit, molecular_weight) {
            Ok(micromolar) => Conversion::Micromolar(micromolar),
            Err(reason) => Conversion::Unconvertible(reason),
        },
    };
    NormalizedMeasurement {
        measurement,
        conversion,
    }
}

pub fn to_micromolar(
    value: f64,
    unit: &str,
    molecular_weight: Option<f64>,
) -> Result<f64, UnconvertibleReason> {
    if !value.is_finite() || value <= 0.0 {
        return Err(UnconvertibleReason::NonPositiveValue);
    }
    let unit = ConcentrationUnit::parse(unit).ok_or(UnconvertibleReason::UnknownUnit)?;
    if let Some(exponent) = unit.molar_exponent() {
        return Ok(scale(value, exponent));
    }
    let mw = usable_weight(molecular_weight)?;
    let factor = unit.mass_factor().ok_or(UnconvertibleReason::UnknownUnit)?;
    Ok(value * factor / mw)
}

pub fn from_micromolar(
    micromolar: f64,
    unit: &str,
    molecular_weight: Option<f64>,
) -> Result<f64, UnconvertibleReason> {
    let unit = ConcentrationUnit::parse(unit).ok_or(UnconvertibleReason::UnknownUnit)?;
    if let Some(exponent) = unit.molar_exponent() {
        return Ok(scale(micromolar, -exponent));
    }
    let mw = usable_weight(molecular_weight)?;
    let factor = unit.mass_factor().ok_or(UnconvertibleReason::UnknownUnit)?;
    Ok(micromolar * mw / factor)
}

fn scale(value: f64, exponent: i32) -> f64 {
    if exponent >= 0 {
        value * 10f64.powi(exponent)
    } else {
        value / 10f64.powi(-exponent)
    }
}

fn usable_weight(molecular_weight: Option<f64>) -> Result<f64, UnconvertibleReason> {
    molecular_weight
        .filter(|mw| mw.is_finite() && *mw > 0.0)
        .ok_or(UnconvertibleReason::MissingMolecularWeight)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedConcentration {
    pub value: f64,
    pub qualifier: Option<Qualifier>,
}

/// Parses concentration text as reported by activity sources.
///
/// Ranges (`a-b`, `a->b`) collapse to the upper bound `≤ b`; `m±e` keeps the
/// mean as an exact value. Returns `None` for text with no usable number.
pub fn parse_concentration(raw: &str) -> Option<ParsedConcentration> {
    let text: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
    if text.is_empty() {
        return None;
    }
    if let Some(value) = parse_number(&text) {
        return Some(exact(value));
    }

    if let Some((mean, error)) = text.split_once('±') {
        let mean = parse_number(mean)?;
        parse_number(error)?;
        return Some(exact(mean));
    }

    if let Some((_, upper)) = text.split_once("->") {
        return Some(bounded(parse_number(upper)?, Qualifier::Le));
    }

    for symbol in ["<=", "=<", "≤", ">=", "=>", "≥", "<", ">"] {
        if let Some(rest) = text.strip_prefix(symbol) {
            let qualifier = Qualifier::from_symbol(symbol)?;
            return Some(bounded(parse_number(rest)?, qualifier));
        }
    }

    let (lower, upper) = text.split_once('-')?;
    parse_number(lower)?;
    Some(bounded(parse_number(upper)?, Qualifier::Le))
}

fn exact(value: f64) -> ParsedConcentration {
    ParsedConcentration {
        value,
        qualifier: None,
    }
}

fn bounded(value: f64, qualifier: Qualifier) -> ParsedConcentration {
    ParsedConcentration {
        value,
        qualifier: Some(qualifier),
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|value| value.is_finite())
}
