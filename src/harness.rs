//! One testbench run: select, drive, read back, report, judge.
//!
//! The program is looked up before the device or any artifact is touched.
//! After that every exit path, pass or fail, goes through the controller's
//! shutdown and the coverage write before the result is returned.

use std::path::PathBuf;

use crate::catalogue::{self, OracleKind, ProgramDescriptor};
use crate::config::HarnessConfig;
use crate::controller::{RunController, RunResult};
use crate::device::Device;
use crate::diagnostics::{self, coverage, state_csv, NullTrace, Reporter, Tag, TraceSink, VcdTrace};
use crate::error::{HarnessError, Result};
use crate::extract::{extract, StateSnapshot};
use crate::oracle::{self, Verdict};
use crate::reference;

/// Everything a passing run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub program: &'static ProgramDescriptor,
    pub run: RunResult,
    pub snapshot: StateSnapshot,
    /// Where the state csv went, when it was written.
    pub csv_path: Option<PathBuf>,
}

impl RunOutcome {
    pub fn latency_us(&self, config: &HarnessConfig) -> f64 {
        config.latency_us(self.run.cycle_count)
    }
}

/// Runs `config.prog` on `device`, opening the waveform trace if configured.
pub fn run<D: Device>(
    config: &HarnessConfig,
    device: D,
    reporter: &mut dyn Reporter,
) -> Result<RunOutcome> {
    let program = catalogue::lookup(&config.prog)?;
    let trace = open_trace(config, reporter);
    run_program(config, program, device, trace, reporter)
}

/// Same as [`run`] with a caller supplied trace sink.
pub fn run_with_trace<D: Device>(
    config: &HarnessConfig,
    device: D,
    trace: Box<dyn TraceSink>,
    reporter: &mut dyn Reporter,
) -> Result<RunOutcome> {
    let program = catalogue::lookup(&config.prog)?;
    run_program(config, program, device, trace, reporter)
}

fn open_trace(config: &HarnessConfig, reporter: &mut dyn Reporter) -> Box<dyn TraceSink> {
    if !config.dump_vcd {
        return Box::new(NullTrace);
    }
    match VcdTrace::create(&config.vcd_path) {
        Ok(trace) => {
            log::info!("tracing to {}", config.vcd_path.display());
            Box::new(trace)
        }
        Err(e) => {
            reporter.warn(&format!(
                "cannot open {}: {}; tracing disabled",
                config.vcd_path.display(),
                e
            ));
            Box::new(NullTrace)
        }
    }
}

fn run_program<D: Device>(
    config: &HarnessConfig,
    program: &'static ProgramDescriptor,
    device: D,
    trace: Box<dyn TraceSink>,
    reporter: &mut dyn Reporter,
) -> Result<RunOutcome> {
    log::info!("running {}", program);
    let mut controller = RunController::new(device, trace, config.max_half_cycles);

    let outcome = drive_and_judge(config, program, &mut controller, reporter);

    controller.shutdown();
    if let Some(path) = &config.coverage_path {
        if let Some(cov) = controller.device().coverage() {
            match coverage::write_coverage(path, program.name, &cov) {
                Ok(()) => log::info!("coverage written to {}", path.display()),
                Err(e) => {
                    reporter.warn(&format!("coverage write to {} failed: {}", path.display(), e))
                }
            }
        } else {
            log::debug!("device reports no coverage");
        }
    }

    outcome
}

fn drive_and_judge<D: Device>(
    config: &HarnessConfig,
    program: &'static ProgramDescriptor,
    controller: &mut RunController<D>,
    reporter: &mut dyn Reporter,
) -> Result<RunOutcome> {
    let run = match controller.run(program) {
        Ok(run) => run,
        Err(e) => {
            reporter.emit(
                Tag::Sim,
                &format!(
                    "prog={} done=0 cycles={}",
                    program.name,
                    controller.device().cycle_count()
                ),
            );
            return Err(e);
        }
    };
    reporter.emit(Tag::Sim, &format!("prog={} done=1 cycles={}", program.name, run.cycle_count));
    reporter.emit(
        Tag::Bench,
        &format!(
            "fpga_cycles={} fpga_us={:.3}",
            run.cycle_count,
            config.latency_us(run.cycle_count)
        ),
    );

    let snapshot = extract(controller.device(), &run);

    let mut csv_path = None;
    if config.dump_state {
        diagnostics::dump_state(reporter, program.name, &snapshot);
        match state_csv::export_state(&config.results_dir, program.name, &snapshot.amplitudes) {
            Ok(path) => {
                log::info!("state written to {}", path.display());
                csv_path = Some(path);
            }
            Err(e) => reporter.warn(&format!("state csv for {} not written: {}", program.name, e)),
        }
        let active = state_csv::export_qubits(program.name);
        let hw = state_csv::renormalized(&snapshot.amplitudes, active);
        let ideal = reference::ideal_state(program);
        if hw.len() == ideal.len() {
            reporter.emit(
                Tag::State,
                &format!("{} fidelity={:.6}", program.name, reference::fidelity(&hw, &ideal)),
            );
        }
    }

    if program.oracle == OracleKind::Unchecked {
        reporter.warn(&format!(
            "{}: no strict oracle, only probability conservation is checked",
            program.name
        ));
    }

    match oracle::check(program, &snapshot.probabilities, snapshot.total_probability) {
        Verdict::Pass => {
            reporter.emit(Tag::Pass, program.name);
            Ok(RunOutcome {
                program,
                run,
                snapshot,
                csv_path,
            })
        }
        Verdict::Fail(reason) => Err(HarnessError::Oracle {
            program: program.name.to_string(),
            reason,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Fault, QcCore};
    use crate::diagnostics::MemoryReporter;

    #[test]
    fn bell2_reports_sim_bench_and_pass() {
        let mut r = MemoryReporter::new();
        let out = run(&HarnessConfig::for_program("bell2"), QcCore::new(), &mut r).unwrap();
        assert!(out.run.completed);
        assert!(r.has(Tag::Sim, "prog=bell2 done=1"));
        assert!(r.has(Tag::Bench, &format!("fpga_cycles={}", out.run.cycle_count)));
        assert!(r.has(Tag::Pass, "bell2"));
        assert_eq!(r.count(Tag::Warn), 0);
        assert!(out.csv_path.is_none());
    }

    #[test]
    fn unchecked_program_warns_and_passes() {
        let mut r = MemoryReporter::new();
        run(&HarnessConfig::for_program("grover3"), QcCore::new(), &mut r).unwrap();
        assert!(r.has(Tag::Warn, "no strict oracle"));
        assert!(r.has(Tag::Pass, "grover3"));
    }

    #[test]
    fn timeout_still_prints_sim_line() {
        let mut r = MemoryReporter::new();
        let config = HarnessConfig {
            max_half_cycles: 100,
            ..HarnessConfig::for_program("qft2")
        };
        let err = run(&config, QcCore::new().with_fault(Fault::Hang), &mut r).unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { .. }));
        assert!(r.has(Tag::Sim, "prog=qft2 done=0"));
        assert_eq!(r.count(Tag::Pass), 0);
        assert_eq!(r.count(Tag::Bench), 0);
    }

    #[test]
    fn dump_state_writes_csv_and_state_lines() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            dump_state: true,
            results_dir: dir.path().to_path_buf(),
            ..HarnessConfig::for_program("qft2")
        };
        let mut r = MemoryReporter::new();
        let out = run(&config, QcCore::new(), &mut r).unwrap();
        assert_eq!(out.csv_path, Some(dir.path().join("qft2_fpga_q2.csv")));
        assert!(r.has(Tag::State, "qft2 amplitudes"));
        assert!(r.has(Tag::State, "idx=15"));
        assert!(r.has(Tag::State, "fidelity="));
    }

    #[test]
    fn csv_failure_is_only_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            dump_state: true,
            results_dir: dir.path().join("missing"),
            ..HarnessConfig::for_program("bell2")
        };
        let mut r = MemoryReporter::new();
        let out = run(&config, QcCore::new(), &mut r).unwrap();
        assert!(out.csv_path.is_none());
        assert!(r.has(Tag::Warn, "not written"));
        assert!(r.has(Tag::Pass, "bell2"));
    }

    #[test]
    fn unopenable_trace_falls_back_to_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            dump_vcd: true,
            vcd_path: dir.path().join("no/such/dir/qc_top.vcd"),
            ..HarnessConfig::for_program("bell2")
        };
        let mut r = MemoryReporter::new();
        run(&config, QcCore::new(), &mut r).unwrap();
        assert!(r.has(Tag::Warn, "tracing disabled"));
        assert!(r.has(Tag::Pass, "bell2"));
    }

    #[test]
    fn coverage_is_written_even_on_oracle_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cov.json");
        let config = HarnessConfig {
            coverage_path: Some(path.clone()),
            ..HarnessConfig::for_program("bell2")
        };
        let mut r = MemoryReporter::new();
        let err = run(&config, QcCore::new().with_fault(Fault::Leak), &mut r).unwrap_err();
        assert!(matches!(err, HarnessError::Oracle { .. }));
        let text = std::fs::read_to_string(&path).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["program"], "bell2");
        assert_eq!(v["coverage"]["programs_completed"], 1);
    }
}
