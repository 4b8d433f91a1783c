use std::io::Write;

use crate::output::OutputError;
use crate::parsers::browser::ArtifactRecord;

/// Pretty-printed JSON array of rows.
pub fn write_json<W: Write>(mut sink: W, records: &[&ArtifactRecord]) -> Result<(), OutputError> {
    serde_json::to_writer_pretty(&mut sink, records)?;
    sink.write_all(b"\n")?;
    sink.flush()?;
    Ok(())
}

/// One compact JSON object per line.
pub fn write_jsonl<W: Write>(mut sink: W, records: &[&ArtifactRecord]) -> Result<(), OutputError> {
    for record in records {
        serde_json::to_writer(&mut sink, record)?;
        sink.write_all(b"\n")?;
    }
    sink.flush()?;
    Ok(())
}
