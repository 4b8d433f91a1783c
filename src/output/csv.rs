use std::io::Write;

use crate::output::OutputError;
use crate::parsers::browser::{ArtifactRecord, ArtifactRow};

/// Header row first, then one line per record. The header is written
/// explicitly so a group of records still gets the full column set.
pub fn write_csv<W: Write>(sink: W, records: &[&ArtifactRecord]) -> Result<(), OutputError> {
    let mut writer = ::csv::WriterBuilder::new().has_headers(false).from_writer(sink);
    writer.write_record(ArtifactRow::COLUMNS)?;
    for record in records {
        writer.serialize(record.to_row())?;
    }
    writer.flush()?;
    Ok(())
}
