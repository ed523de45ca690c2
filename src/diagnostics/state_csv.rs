// csv export of the active sub-state, renormalized to unit l2 norm

use std::io;
use std::path::{Path, PathBuf};

use num_complex::Complex64;

use crate::catalogue;
use crate::device::MAX_QUBITS;

pub const CSV_COLUMNS: [&str; 3] = ["index", "re", "im"];

/// Decimal places written for each component.
pub const CSV_PRECISION: usize = 8;

/// `<results_dir>/<program>_fpga_q<active>.csv`
pub fn state_csv_path(results_dir: &Path, program: &str, active: u32) -> PathBuf {
    results_dir.join(format!("{}_fpga_q{}.csv", program, active))
}

/// Active qubit count used for export, falling back to the full register.
pub fn export_qubits(program: &str) -> u32 {
    catalogue::active_qubits(program).unwrap_or(MAX_QUBITS as u32)
}

/// First `2^active` amplitudes scaled to unit l2 norm. A zero vector is returned unchanged.
pub fn renormalized(amplitudes: &[Complex64], active: u32) -> Vec<Complex64> {
    let n = (1usize << active).min(amplitudes.len());
    let sub = &amplitudes[..n];
    let norm = sub.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
    if norm > 0.0 {
        sub.iter().map(|a| *a / norm).collect()
    } else {
        sub.to_vec()
    }
}

pub fn write_state_csv(path: &Path, rows: &[Complex64]) -> io::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(CSV_COLUMNS)?;
    for (i, a) in rows.iter().enumerate() {
        wtr.write_record(&[
            i.to_string(),
            format!("{:.prec$}", a.re, prec = CSV_PRECISION),
            format!("{:.prec$}", a.im, prec = CSV_PRECISION),
        ])?;
    }
    wtr.flush()
}

/// Renormalizes and writes the program's sub-state; returns where it went.
pub fn export_state(
    results_dir: &Path,
    program: &str,
    amplitudes: &[Complex64],
) -> io::Result<PathBuf> {
    let active = export_qubits(program);
    let path = state_csv_path(results_dir, program, active);
    write_state_csv(&path, &renormalized(amplitudes, active))?;
    Ok(path)
}
