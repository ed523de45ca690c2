//! Clock/start protocol and the bounded completion poll.
//!
//! A run is: quiescent inputs, [`SETTLE_HALF_CYCLES`] idle ticks, one tick
//! with `start` high, then ticks until `done` is seen or the half-cycle
//! budget runs out. Every tick toggles `clk`, evaluates the device, samples
//! the trace at the current time and then advances time by [`HALF_PERIOD`].

use crate::catalogue::ProgramDescriptor;
use crate::device::Device;
use crate::diagnostics::TraceSink;
use crate::error::{HarnessError, Result};

/// Half clock period in trace time units (ns): 100 MHz equivalent.
pub const HALF_PERIOD: u64 = 5;

/// Idle half cycles before the start pulse.
pub const SETTLE_HALF_CYCLES: u32 = 8;

pub const DEFAULT_MAX_HALF_CYCLES: u64 = 200_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    /// Cycle count reported by the device when polling stopped.
    pub cycle_count: u32,
    pub completed: bool,
    /// Half cycles ticked in total, settle window and start pulse included.
    pub half_cycles: u64,
    /// Simulated time when polling stopped.
    pub sim_time: u64,
}

pub struct RunController<D: Device> {
    device: D,
    trace: Box<dyn TraceSink>,
    time: u64,
    half_cycles: u64,
    max_half_cycles: u64,
    shut_down: bool,
}

impl<D: Device> RunController<D> {
    pub fn new(device: D, trace: Box<dyn TraceSink>, max_half_cycles: u64) -> Self {
        RunController {
            device,
            trace,
            time: 0,
            half_cycles: 0,
            max_half_cycles,
            shut_down: false,
        }
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn trace_open(&self) -> bool {
        self.trace.is_open()
    }

    fn tick(&mut self) {
        let clk = self.device.clk();
        self.device.set_clk(!clk);
        self.device.eval();
        self.trace.dump(self.time, &self.device.signals());
        self.time += HALF_PERIOD;
        self.half_cycles += 1;
    }

    /// Drives one program through the protocol. Never fails: a missing
    /// `done` shows up as `completed == false`.
    pub fn drive(&mut self, prog_id: u32) -> RunResult {
        self.device.set_clk(false);
        self.device.set_start(false);
        self.device.set_prog_id(prog_id);

        for _ in 0..SETTLE_HALF_CYCLES {
            self.tick();
        }
        log::debug!(
            "controller: settled at t={}, pulsing start for prog_id {}",
            self.time,
            prog_id
        );

        self.device.set_start(true);
        self.tick();
        self.device.set_start(false);

        let mut completed = false;
        for _ in 0..self.max_half_cycles {
            self.tick();
            if self.device.done() {
                completed = true;
                break;
            }
        }

        let result = RunResult {
            cycle_count: self.device.cycle_count(),
            completed,
            half_cycles: self.half_cycles,
            sim_time: self.time,
        };
        log::debug!("controller: {:?}", result);
        result
    }

    /// Runs `program`, failing with [`HarnessError::Timeout`] when `done` never rises.
    pub fn run(&mut self, program: &ProgramDescriptor) -> Result<RunResult> {
        let result = self.drive(program.id);
        if result.completed {
            Ok(result)
        } else {
            Err(HarnessError::Timeout {
                program: program.name.to_string(),
                half_cycles: result.half_cycles,
            })
        }
    }

    /// Closes the trace and finalizes the device. Idempotent; the harness
    /// calls it on every exit path.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.device.finalize();
        self.trace.close();
        self.shut_down = true;
    }

    pub fn into_device(mut self) -> D {
        self.shutdown();
        self.device
    }
}
