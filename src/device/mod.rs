//! The unit under test, seen from the testbench.
//!
//! The harness only ever talks to a [`Device`]: it drives `clk`, `start` and
//! `prog_id`, calls [`Device::eval`] once per half cycle, samples `done` and
//! `cycle_count`, and reads the amplitude memory slot by slot once the run has
//! completed. [`QcCore`] is the cycle-stepped behavioural model the binary
//! runs against; tests substitute their own doubles.

pub mod core;
pub mod microcode;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::fixed_point::RawAmplitude;

pub use self::core::{Fault, QcCore};
pub use self::microcode::MicroOp;

/// Widest register the core supports.
pub const MAX_QUBITS: usize = 4;

/// Number of amplitude slots in device memory.
pub const DIM: usize = 1 << MAX_QUBITS;

/// Snapshot of the top-level ports, used for trace samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signals {
    pub clk: bool,
    pub start: bool,
    pub done: bool,
    pub prog_id: u32,
    pub cycle_count: u32,
}

/// Coverage collected by a device over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageReport {
    pub programs_started: u64,
    pub programs_completed: u64,
    pub busy_cycles: u64,
    pub op_hits: BTreeMap<String, u64>,
}

pub trait Device {
    fn set_clk(&mut self, level: bool);

    fn set_start(&mut self, level: bool);

    fn set_prog_id(&mut self, prog_id: u32);

    /// Settles the model after an input change; state advances on rising `clk`.
    fn eval(&mut self);

    fn signals(&self) -> Signals;

    fn clk(&self) -> bool {
        self.signals().clk
    }

    fn done(&self) -> bool {
        self.signals().done
    }

    fn cycle_count(&self) -> u32 {
        self.signals().cycle_count
    }

    /// Reads one amplitude slot. Only meaningful once `done` has been observed.
    fn read_slot(&self, index: usize) -> RawAmplitude;

    /// End-of-simulation hook, called exactly once on every exit path.
    fn finalize(&mut self) {}

    /// Devices that collect coverage return it here.
    fn coverage(&self) -> Option<CoverageReport> {
        None
    }
}

// lets callers lend a device to the controller and inspect it afterwards
impl<D: Device + ?Sized> Device for &mut D {
    fn set_clk(&mut self, level: bool) {
        (**self).set_clk(level)
    }

    fn set_start(&mut self, level: bool) {
        (**self).set_start(level)
    }

    fn set_prog_id(&mut self, prog_id: u32) {
        (**self).set_prog_id(prog_id)
    }

    fn eval(&mut self) {
        (**self).eval()
    }

    fn signals(&self) -> Signals {
        (**self).signals()
    }

    fn read_slot(&self, index: usize) -> RawAmplitude {
        (**self).read_slot(index)
    }

    fn finalize(&mut self) {
        (**self).finalize()
    }

    fn coverage(&self) -> Option<CoverageReport> {
        (**self).coverage()
    }
}
