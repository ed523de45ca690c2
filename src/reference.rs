//! Double precision ideal states, and the distance measures the bench uses to
//! compare device output against them.

use std::path::Path;

use num_complex::Complex64;

use crate::catalogue::{Family, ProgramDescriptor};
use crate::error::{HarnessError, Result};

fn uniform(k: u32) -> Vec<Complex64> {
    let n = 1usize << k;
    vec![Complex64::new(1.0 / (n as f64).sqrt(), 0.0); n]
}

/// QFT applied to |0...0>: the uniform superposition over `2^k` states.
pub fn qft_state(k: u32) -> Vec<Complex64> {
    uniform(k)
}

/// One Grover iteration on `k` qubits: oracle flip on `marked`, then reflection
/// about the mean.
pub fn grover_state(k: u32, marked: usize) -> Vec<Complex64> {
    let mut amps = uniform(k);
    assert!(marked < amps.len(), "marked index {} out of range", marked);
    amps[marked] = -amps[marked];
    let mean = amps.iter().sum::<Complex64>() / amps.len() as f64;
    for a in amps.iter_mut() {
        *a = mean * 2.0 - *a;
    }
    normalize(&mut amps);
    amps
}

/// `(|00> + |11>) / sqrt(2)`, qubit 0 least significant.
pub fn bell_state() -> Vec<Complex64> {
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let mut amps = vec![Complex64::new(0.0, 0.0); 4];
    amps[0] = Complex64::new(h, 0.0);
    amps[3] = Complex64::new(h, 0.0);
    amps
}

/// Ideal final state for a catalogue program, sized to its active qubits.
pub fn ideal_state(program: &ProgramDescriptor) -> Vec<Complex64> {
    match program.family {
        Family::Qft => qft_state(program.qubits),
        Family::Grover => grover_state(program.qubits, (1usize << program.qubits) - 1),
        Family::Bell => bell_state(),
    }
}

pub fn norm(amps: &[Complex64]) -> f64 {
    amps.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt()
}

fn normalize(amps: &mut [Complex64]) {
    let n = norm(amps);
    if n > 0.0 {
        amps.iter_mut().for_each(|a| *a /= n);
    }
}

fn inner(a: &[Complex64], b: &[Complex64]) -> Complex64 {
    assert_eq!(a.len(), b.len(), "statevector lengths differ");
    a.iter().zip(b).map(|(x, y)| x.conj() * y).sum()
}

/// `|<a|b>|^2`, both vectors assumed normalized.
pub fn fidelity(a: &[Complex64], b: &[Complex64]) -> f64 {
    inner(a, b).norm_sqr()
}

/// Euclidean distance `||a - b||`.
pub fn l2_err(a: &[Complex64], b: &[Complex64]) -> f64 {
    assert_eq!(a.len(), b.len(), "statevector lengths differ");
    a.iter().zip(b).map(|(x, y)| (x - y).norm_sqr()).sum::<f64>().sqrt()
}

/// Rotates `state` by a global phase so that `<reference|state>` is real and
/// non-negative. Global phase is unobservable but would dominate `l2_err`.
pub fn align_global_phase(state: &[Complex64], reference: &[Complex64]) -> Vec<Complex64> {
    let overlap = inner(reference, state);
    let mag = overlap.norm();
    if mag == 0.0 {
        return state.to_vec();
    }
    let rot = overlap.conj() / mag;
    state.iter().map(|a| a * rot).collect()
}

/// Reads a state csv (`index,re,im`) back into a normalized vector of
/// `2^qubits` entries. Without `qubits` the width is the smallest that holds
/// the largest index. Malformed rows and out of range indices are skipped.
pub fn load_state_csv(path: &Path, qubits: Option<u32>) -> Result<Vec<Complex64>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| HarnessError::io(path, e.into()))?;
    let rows: Vec<(usize, Complex64)> = reader
        .records()
        .flatten()
        .filter_map(|record| parse_row(&record))
        .collect();

    let Some(max_idx) = rows.iter().map(|(i, _)| *i).max() else {
        return Ok(Vec::new());
    };
    let k = qubits.unwrap_or_else(|| (usize::BITS - max_idx.leading_zeros()).max(1));
    let mut amps = vec![Complex64::new(0.0, 0.0); 1 << k];
    for (i, a) in rows {
        if let Some(slot) = amps.get_mut(i) {
            *slot = a;
        }
    }
    normalize(&mut amps);
    Ok(amps)
}

fn parse_row(record: &csv::StringRecord) -> Option<(usize, Complex64)> {
    let index = record.get(0)?.parse().ok()?;
    let re = record.get(1)?.parse().ok()?;
    let im = record.get(2)?.parse().ok()?;
    Some((index, Complex64::new(re, im)))
}
