use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::UnifyError;
use crate::tables::RawTable;

pub fn read_text(path: &Utf8Path) -> Result<String, UnifyError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| UnifyError::Filesystem(format!("read {path}: {err}")))?;
    Ok(match content.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => content,
    })
}

pub fn read_table(path: &Utf8Path) -> Result<RawTable, UnifyError> {
    let file = fs::File::open(path.as_std_path())
        .map_err(|err| UnifyError::Filesystem(format!("open {path}: {err}")))?;
    RawTable::from_reader(file).map_err(|err| match err {
        UnifyError::Csv(message) => UnifyError::Csv(format!("{path}: {message}")),
        other => other,
    })
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), UnifyError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| UnifyError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("peptide-unify")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| UnifyError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| UnifyError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| UnifyError::Filesystem(format!("write {path}: {err}")))?;
    tracing::debug!(%path, bytes = content.len(), "wrote file");
    Ok(())
}

pub fn write_table_atomic(path: &Utf8Path, table: &RawTable) -> Result<(), UnifyError> {
    let mut buffer = Vec::new();
    table.write_csv(&mut buffer)?;
    write_bytes_atomic(path, &buffer)
}
