use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::device::CoverageReport;

#[derive(Debug, Serialize)]
struct CoverageArtifact<'a> {
    program: &'a str,
    coverage: &'a CoverageReport,
}

/// Writes the device's coverage as pretty json.
pub fn write_coverage(path: &Path, program: &str, coverage: &CoverageReport) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, &CoverageArtifact { program, coverage })?;
    writeln!(out)?;
    out.flush()
}
