use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::events::MissionEvent;
use crate::mission::MissionSummary;

#[derive(Debug, Serialize)]
struct Report<'a> {
    summary: &'a MissionSummary,
    events: &'a [MissionEvent],
}

/// Write the mission summary and event log as pretty-printed JSON.
pub fn write_summary<W: Write>(
    writer: &mut W,
    summary: &MissionSummary,
    events: &[MissionEvent],
) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, &Report { summary, events })?;
    writeln!(writer)
}

pub fn write_summary_file<P: AsRef<Path>>(
    path: P,
    summary: &MissionSummary,
    events: &[MissionEvent],
) -> io::Result<()> {
    let mut file = io::BufWriter::new(std::fs::File::create(path)?);
    write_summary(&mut file, summary, events)?;
    file.flush()
}
