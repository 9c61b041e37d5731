use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::UnifyError;

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:([A-Za-z][A-Za-z0-9]*)_)?([0-9]+)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeptideKey {
    prefix: Option<String>,
    number: u64,
    n_terminus: String,
}

impl PeptideKey {
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn n_terminus(&self) -> &str {
        &self.n_terminus
    }

    pub fn id_string(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}_{}", self.number),
            None => self.number.to_string(),
        }
    }
}

impl Ord for PeptideKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.number
            .cmp(&other.number)
            .then_with(|| self.prefix.cmp(&other.prefix))
            .then_with(|| self.n_terminus.cmp(&other.n_terminus))
    }
}

impl PartialOrd for PeptideKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PeptideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.n_terminus.is_empty() {
            write!(f, "{}", self.id_string())
        } else {
            write!(f, "{}/{}", self.id_string(), self.n_terminus)
        }
    }
}

/// Turns the id spellings found across sources into [`PeptideKey`]s.
///
/// Bare numeric ids take `default_prefix` when one is configured, so `51` and
/// `dbaasps_51` resolve to the same key.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    default_prefix: Option<String>,
}

impl IdentityResolver {
    pub fn new(default_prefix: Option<&str>) -> Self {
        let default_prefix = default_prefix
            .map(strip_whitespace)
            .map(|prefix| prefix.to_uppercase())
            .filter(|prefix| !prefix.is_empty());
        Self { default_prefix }
    }

    pub fn resolve(&self, raw_id: &str, n_terminus: &str) -> Result<PeptideKey, UnifyError> {
        let compact = strip_whitespace(raw_id);
        let captures = ID_PATTERN
            .captures(&compact)
            .ok_or_else(|| UnifyError::InvalidIdentifier(raw_id.to_string()))?;
        let number = captures[2]
            .parse::<u64>()
            .map_err(|_| UnifyError::InvalidIdentifier(raw_id.to_string()))?;
        let prefix = captures
            .get(1)
            .map(|m| m.as_str().to_uppercase())
            .or_else(|| self.default_prefix.clone());
        Ok(PeptideKey {
            prefix,
            number,
            n_terminus: normalize_terminus(n_terminus),
        })
    }
}

pub fn resolve(raw_id: &str, n_terminus: &str) -> Result<PeptideKey, UnifyError> {
    IdentityResolver::default().resolve(raw_id, n_terminus)
}

pub fn normalize_terminus(value: &str) -> String {
    strip_whitespace(value).to_uppercase()
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|ch| !ch.is_whitespace()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Qualifier {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "≤")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "≥")]
    Ge,
}

impl Qualifier {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "<" => Some(Qualifier::Lt),
            "<=" | "=<" | "≤" => Some(Qualifier::Le),
            ">" => Some(Qualifier::Gt),
            ">=" | "=>" | "≥" => Some(Qualifier::Ge),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Qualifier::Lt => "<",
            Qualifier::Le => "≤",
            Qualifier::Gt => ">",
            Qualifier::Ge => "≥",
        }
    }

    pub fn is_upper_bound(self) -> bool {
        matches!(self, Qualifier::Lt | Qualifier::Le)
    }

    pub fn is_strict(self) -> bool {
        matches!(self, Qualifier::Lt | Qualifier::Gt)
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Exact,
    QualifierBound,
    Unconvertible,
    Absent,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Exact => write!(f, "exact"),
            Provenance::QualifierBound => write!(f, "qualifier-bound"),
            Provenance::Unconvertible => write!(f, "unconvertible"),
            Provenance::Absent => write!(f, "absent"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Physchem,
    Activity,
    Lipophilicity,
    SelfAssembly,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Physchem => write!(f, "physchem"),
            SourceKind::Activity => write!(f, "activity"),
            SourceKind::Lipophilicity => write!(f, "lipophilicity"),
            SourceKind::SelfAssembly => write!(f, "self-assembly"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowRef {
    pub source: SourceKind,
    pub row: usize,
}

impl RowRef {
    pub fn new(source: SourceKind, row: usize) -> Self {
        Self { source, row }
    }
}
