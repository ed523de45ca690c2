// statistical oracles over the decoded probability vector

use itertools::Itertools;

use crate::catalogue::{self, OracleKind, ProgramDescriptor};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Validates by program name. An unknown name is a configuration error,
/// reported as `Err` rather than as a failing verdict.
pub fn validate(program: &str, probabilities: &[f64], total: f64) -> Result<Verdict> {
    let descriptor = catalogue::lookup(program)?;
    Ok(check(descriptor, probabilities, total))
}

/// Conservation check followed by the program's family check.
pub fn check(descriptor: &ProgramDescriptor, probabilities: &[f64], total: f64) -> Verdict {
    if (1.0 - total).abs() > descriptor.norm_tolerance {
        return Verdict::Fail(format!("probability sum off ({:.6})", total));
    }

    let outcome = match descriptor.oracle {
        OracleKind::Uniform {
            qubits,
            tolerance,
            leakage,
        } => check_uniform(probabilities, qubits, tolerance, leakage),
        OracleKind::Amplify { target, confidence } => {
            check_amplify(probabilities, target, confidence)
        }
        OracleKind::Entangled {
            pair,
            tolerance,
            leakage,
        } => check_entangled(probabilities, total, pair, tolerance, leakage),
        OracleKind::Unchecked => Ok(()),
    };

    match outcome {
        Ok(()) => Verdict::Pass,
        Err(reason) => Verdict::Fail(reason),
    }
}

fn prob_at(probabilities: &[f64], i: usize) -> f64 {
    probabilities.get(i).copied().unwrap_or(0.0)
}

fn check_uniform(
    probabilities: &[f64],
    qubits: u32,
    tolerance: f64,
    leakage: f64,
) -> std::result::Result<(), String> {
    let active = 1usize << qubits;
    let expected = 1.0 / active as f64;
    for i in 0..active {
        let p = prob_at(probabilities, i);
        if (p - expected).abs() > tolerance {
            return Err(format!(
                "uneven superposition at index {} (p={:.6}, expected {:.6})",
                i, p, expected
            ));
        }
    }
    let outside: f64 = probabilities.iter().skip(active).sum();
    if outside > leakage {
        return Err(format!("leakage detected ({:.6} outside first {} states)", outside, active));
    }
    Ok(())
}

fn check_amplify(
    probabilities: &[f64],
    target: usize,
    confidence: f64,
) -> std::result::Result<(), String> {
    let Some(peak) = probabilities.iter().position_max_by(|a, b| a.total_cmp(b)) else {
        return Err("empty probability vector".to_string());
    };
    if peak != target {
        return Err(format!("expected maximum at index {}, got {}", target, peak));
    }
    if probabilities[peak] < confidence {
        return Err(format!(
            "marked state amplitude too small (p={:.6} < {:.2})",
            probabilities[peak], confidence
        ));
    }
    Ok(())
}

fn check_entangled(
    probabilities: &[f64],
    total: f64,
    (a, b): (usize, usize),
    tolerance: f64,
    leakage: f64,
) -> std::result::Result<(), String> {
    let pa = prob_at(probabilities, a);
    let pb = prob_at(probabilities, b);
    if (pa - 0.5).abs() > tolerance || (pb - 0.5).abs() > tolerance {
        return Err(format!("amplitudes not 0.5 each (p{}={:.6}, p{}={:.6})", a, pa, b, pb));
    }
    if (pa - pb).abs() > tolerance {
        return Err(format!("imbalance between |{:02b}> and |{:02b}>", a, b));
    }
    let others = total - (pa + pb);
    if others > leakage {
        return Err(format!("leakage detected ({:.6} outside the entangled pair)", others));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::lookup;
    use crate::device::DIM;

    fn uniform(k: u32) -> Vec<f64> {
        let mut p = vec![0.0; DIM];
        let n = 1usize << k;
        for v in p.iter_mut().take(n) {
            *v = 1.0 / n as f64;
        }
        p
    }

    fn verdict(name: &str, p: &[f64]) -> Verdict {
        let total: f64 = p.iter().sum();
        validate(name, p, total).unwrap()
    }

    #[test]
    fn ideal_uniform_passes() {
        assert_eq!(verdict("qft2", &uniform(2)), Verdict::Pass);
        assert_eq!(verdict("qft3", &uniform(3)), Verdict::Pass);
        assert_eq!(verdict("qft4", &uniform(4)), Verdict::Pass);
    }

    #[test]
    fn conservation_is_checked_first() {
        let mut p = uniform(2);
        p[0] += 0.03;
        match verdict("qft2", &p) {
            Verdict::Fail(reason) => {
                assert!(reason.starts_with("probability sum off"), "{}", reason)
            }
            Verdict::Pass => panic!("should fail"),
        }
    }

    #[test]
    fn uneven_uniform_names_the_index() {
        let mut p = uniform(2);
        p[1] += 0.015;
        p[2] -= 0.015;
        match verdict("qft2", &p) {
            Verdict::Fail(reason) => assert!(reason.contains("index 1"), "{}", reason),
            Verdict::Pass => panic!("should fail"),
        }
    }

    #[test]
    fn uniform_leakage_outside_subspace_fails() {
        let mut p = uniform(2);
        for v in p.iter_mut().take(4) {
            *v -= 0.004;
        }
        p[9] = 0.016;
        match verdict("qft2", &p) {
            Verdict::Fail(reason) => assert!(reason.contains("leakage"), "{}", reason),
            Verdict::Pass => panic!("should fail"),
        }
    }

    #[test]
    fn grover_peak_must_be_marked_state() {
        let mut p = vec![0.0; DIM];
        p[3] = 0.97;
        p[0] = 0.01;
        p[1] = 0.01;
        p[2] = 0.01;
        assert_eq!(verdict("grover2", &p), Verdict::Pass);

        p.swap(3, 2);
        match verdict("grover2", &p) {
            Verdict::Fail(reason) => assert!(reason.contains("got 2"), "{}", reason),
            Verdict::Pass => panic!("should fail"),
        }
    }

    #[test]
    fn grover_weak_peak_fails() {
        let mut p = vec![0.0; DIM];
        p[3] = 0.7;
        p[0] = 0.1;
        p[1] = 0.1;
        p[2] = 0.1;
        match verdict("grover2", &p) {
            Verdict::Fail(reason) => assert!(reason.contains("too small"), "{}", reason),
            Verdict::Pass => panic!("should fail"),
        }
    }

    #[test]
    fn bell_checks() {
        let mut p = vec![0.0; DIM];
        p[0] = 0.5;
        p[3] = 0.5;
        assert_eq!(verdict("bell2", &p), Verdict::Pass);

        let mut lopsided = vec![0.0; DIM];
        lopsided[0] = 0.6;
        lopsided[3] = 0.4;
        assert!(!verdict("bell2", &lopsided).is_pass());

        // each peak is within 0.05 of one half, but they differ by 0.08
        let mut skewed = vec![0.0; DIM];
        skewed[0] = 0.54;
        skewed[3] = 0.46;
        match verdict("bell2", &skewed) {
            Verdict::Fail(reason) => assert!(reason.contains("imbalance"), "{}", reason),
            Verdict::Pass => panic!("should fail"),
        }

        let mut leaky = vec![0.0; DIM];
        leaky[0] = 0.46;
        leaky[3] = 0.46;
        leaky[1] = 0.08;
        match verdict("bell2", &leaky) {
            Verdict::Fail(reason) => assert!(reason.contains("leakage"), "{}", reason),
            Verdict::Pass => panic!("should fail"),
        }
    }

    #[test]
    fn unchecked_programs_only_need_conservation() {
        // a flat grover3 output would fail any amplification oracle, but passes here
        assert_eq!(verdict("grover3", &uniform(3)), Verdict::Pass);
        assert_eq!(verdict("grover4", &uniform(4)), Verdict::Pass);

        let mut p = uniform(3);
        p[0] += 0.2;
        assert!(!verdict("grover3", &p).is_pass());
    }

    #[test]
    fn unknown_program_is_an_error_not_a_verdict() {
        assert!(validate("nonexistent", &uniform(2), 1.0).is_err());
    }

    #[test]
    fn check_works_on_descriptor() {
        let d = lookup("bell2").unwrap();
        let mut p = vec![0.0; DIM];
        p[0] = 0.49;
        p[3] = 0.51;
        assert!(check(d, &p, 1.0).is_pass());
    }
}
