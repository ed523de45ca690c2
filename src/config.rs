//! Run configuration.
//!
//! Built from the command line first, then environment toggles are applied on
//! top (`DUMP_VCD`, `DUMP_STATE`). Those two only need to be present, their
//! value is ignored. `FCLK_HZ` and `QC_COVERAGE` are read by clap directly.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::controller::DEFAULT_MAX_HALF_CYCLES;
use crate::device::Fault;

pub const DEFAULT_PROGRAM: &str = "qft4";
pub const DEFAULT_FCLK_HZ: f64 = 1.0e8;
pub const DEFAULT_VCD_PATH: &str = "obj_dir/qc_top.vcd";
pub const DEFAULT_RESULTS_DIR: &str = "experiments/results/states";

pub const ENV_DUMP_VCD: &str = "DUMP_VCD";
pub const ENV_DUMP_STATE: &str = "DUMP_STATE";

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub prog: String,
    /// Declared clock, only used to convert cycles to wall-clock latency.
    pub fclk_hz: f64,
    /// Per-amplitude dump plus csv export.
    pub dump_state: bool,
    pub dump_vcd: bool,
    pub vcd_path: PathBuf,
    pub coverage_path: Option<PathBuf>,
    pub results_dir: PathBuf,
    pub max_half_cycles: u64,
    pub fault: Fault,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            prog: DEFAULT_PROGRAM.to_string(),
            fclk_hz: DEFAULT_FCLK_HZ,
            dump_state: false,
            dump_vcd: false,
            vcd_path: PathBuf::from(DEFAULT_VCD_PATH),
            coverage_path: None,
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            max_half_cycles: DEFAULT_MAX_HALF_CYCLES,
            fault: Fault::None,
        }
    }
}

impl HarnessConfig {
    pub fn for_program(prog: impl Into<String>) -> Self {
        HarnessConfig {
            prog: prog.into(),
            ..Default::default()
        }
    }

    /// Turns on toggles whose environment variable is set. Never turns anything off.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var_os(key).is_some());
    }

    fn apply_overrides(&mut self, is_set: impl Fn(&str) -> bool) {
        if is_set(ENV_DUMP_VCD) {
            self.dump_vcd = true;
        }
        if is_set(ENV_DUMP_STATE) {
            self.dump_state = true;
        }
    }

    /// Wall-clock latency in microseconds for `cycles` at the declared clock.
    pub fn latency_us(&self, cycles: u32) -> f64 {
        cycles as f64 * 1.0e6 / self.fclk_hz
    }
}

/// Rewrites verilator style `+key=value` plusargs to `--key=value`, so old
/// invocations like `qctb +prog=bell2` keep working. Underscores in the key
/// become dashes; the value is kept as is. Arguments that are not valid UTF-8
/// pass through untouched.
pub fn normalize_plusargs<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .enumerate()
        .map(|(i, a)| {
            let a: OsString = a.into();
            if i == 0 {
                return a;
            }
            let long = a.to_str().and_then(plusarg);
            long.map_or(a, OsString::from)
        })
        .collect()
}

fn plusarg(arg: &str) -> Option<String> {
    let (key, value) = arg.strip_prefix('+')?.split_once('=')?;
    Some(format!("--{}={}", key.replace('_', "-"), value))
}
