use std::io::{Cursor, Read};

use crate::error::ConnectorError;

/// Extract newline-delimited text content from a downloaded archive.
/// Supported containers are `.zip` (exactly one member, per distilled spec
/// §6.3) and `.gz`. Anything else is a corrupt-input error, matching the
/// source's validation that downloads are always one of these two shapes.
pub fn extract_lines(filename: &str, bytes: &[u8]) -> Result<Vec<String>, ConnectorError> {
    let contents = if filename.ends_with(".zip") {
        extract_zip(bytes)?
    } else if filename.ends_with(".gz") {
        extract_gz(bytes)?
    } else {
        return Err(ConnectorError::CorruptInput(format!(
            "unsupported archive extension in '{filename}'"
        )));
    };

    Ok(contents
        .lines()
        .map(str::to_owned)
        .filter(|line| !line.is_empty())
        .collect())
}

fn extract_zip(bytes: &[u8]) -> Result<String, ConnectorError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ConnectorError::CorruptInput(format!("invalid zip: {e}")))?;

    if archive.len() != 1 {
        return Err(ConnectorError::CorruptInput(format!(
            "expected exactly one member in zip, found {}",
            archive.len()
        )));
    }

    let mut file = archive
        .by_index(0)
        .map_err(|e| ConnectorError::CorruptInput(format!("invalid zip member: {e}")))?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| ConnectorError::CorruptInput(format!("unreadable zip member: {e}")))?;
    Ok(contents)
}

fn extract_gz(bytes: &[u8]) -> Result<String, ConnectorError> {
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut contents = String::new();
    decoder
        .read_to_string(&mut contents)
        .map_err(|e| ConnectorError::CorruptInput(format!("invalid gzip stream: {e}")))?;
    Ok(contents)
}
