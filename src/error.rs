use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::SourceKind;

#[derive(Debug, Error, Diagnostic)]
pub enum UnifyError {
    #[error("invalid peptide identifier: {0}")]
    InvalidIdentifier(String),

    #[error("required source table is missing: {0}")]
    MissingRequiredSource(SourceKind),

    #[error("{table} table is missing required column '{column}'")]
    MissingRequiredColumn { table: SourceKind, column: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("DBAASP request failed: {0}")]
    DbaaspHttp(String),

    #[error("DBAASP returned status {status}: {message}")]
    DbaaspStatus { status: u16, message: String },

    #[error("malformed peptide card: {0}")]
    InvalidCard(String),
}
