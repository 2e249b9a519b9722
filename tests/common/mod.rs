use std::io::{Error, Write};
use tempfile::NamedTempFile;

pub const HEADER: &str = "type, customer, amount, description";

/// Writes a ledger batch file with the standard header followed by `rows`.
pub fn ledger_csv(rows: &[&str]) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{}", HEADER)?;
    for row in rows {
        writeln!(file, "{}", row)?;
    }
    file.flush()?;
    Ok(file)
}
