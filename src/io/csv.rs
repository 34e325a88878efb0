use std::io::{self, Write};
use std::path::Path;

use crate::gnc::TraceSample;

/// Write the ascent trace as CSV.
///
/// Columns: ut, altitude, apoapsis, periapsis, speed, stage, throttle,
///          advisory_throttle, pitch_deg, total_dv, stage_dv
pub fn write_trace<W: Write>(writer: &mut W, trace: &[TraceSample]) -> io::Result<()> {
    writeln!(
        writer,
        "ut,altitude,apoapsis,periapsis,speed,stage,throttle,\
         advisory_throttle,pitch_deg,total_dv,stage_dv"
    )?;

    for s in trace {
        let stage = s.stage.map_or(String::new(), |id| id.0.to_string());
        let pitch = s.pitch.map_or(String::new(), |p| format!("{p:.2}"));
        writeln!(
            writer,
            "{:.2},{:.1},{:.1},{:.1},{:.2},{},{:.3},{:.2},{},{:.2},{:.2}",
            s.ut,
            s.altitude,
            s.apoapsis,
            s.periapsis,
            s.speed,
            stage,
            s.throttle,
            s.advisory_throttle,
            pitch,
            s.total_dv,
            s.stage_dv,
        )?;
    }

    Ok(())
}

pub fn write_trace_file<P: AsRef<Path>>(path: P, trace: &[TraceSample]) -> io::Result<()> {
    let mut file = io::BufWriter::new(std::fs::File::create(path)?);
    write_trace(&mut file, trace)?;
    file.flush()
}
