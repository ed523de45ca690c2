// reads the amplitude memory back once the core reports done

use num_complex::Complex64;

use crate::controller::RunResult;
use crate::device::{Device, DIM};
use crate::fixed_point::{decode_raw, magnitude_squared};

/// Decoded view of device memory after a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub amplitudes: Vec<Complex64>,
    pub probabilities: Vec<f64>,
    pub total_probability: f64,
}

impl StateSnapshot {
    /// Builds a snapshot from already decoded amplitudes.
    pub fn from_amplitudes(amplitudes: Vec<Complex64>) -> Self {
        let probabilities: Vec<f64> = amplitudes.iter().map(|a| magnitude_squared(*a)).collect();
        let total_probability = probabilities.iter().sum();
        StateSnapshot {
            amplitudes,
            probabilities,
            total_probability,
        }
    }
}

/// Reads every slot exactly once and decodes it.
///
/// # Panics
///
/// If `run` did not complete: memory contents are undefined before `done`,
/// and reading them anyway is a harness bug.
pub fn extract<D: Device + ?Sized>(device: &D, run: &RunResult) -> StateSnapshot {
    assert!(
        run.completed,
        "state extraction before completion (cycle_count={})",
        run.cycle_count
    );
    let amplitudes = (0..DIM).map(|i| decode_raw(device.read_slot(i))).collect();
    StateSnapshot::from_amplitudes(amplitudes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Signals;
    use crate::fixed_point::RawAmplitude;
    use std::cell::Cell;

    // memory-only double that counts slot reads
    struct Memory {
        slots: [RawAmplitude; DIM],
        reads: Cell<usize>,
    }

    impl Device for Memory {
        fn set_clk(&mut self, _level: bool) {}
        fn set_start(&mut self, _level: bool) {}
        fn set_prog_id(&mut self, _prog_id: u32) {}
        fn eval(&mut self) {}
        fn signals(&self) -> Signals {
            Signals::default()
        }
        fn read_slot(&self, index: usize) -> RawAmplitude {
            self.reads.set(self.reads.get() + 1);
            self.slots[index]
        }
    }

    fn completed() -> RunResult {
        RunResult {
            cycle_count: 10,
            completed: true,
            half_cycles: 20,
            sim_time: 100,
        }
    }

    #[test]
    fn reads_each_slot_once_and_sums() {
        let mut slots = [RawAmplitude::ZERO; DIM];
        slots[0] = RawAmplitude::new(16384, 0);
        slots[5] = RawAmplitude::new(0, -16384);
        let mem = Memory {
            slots,
            reads: Cell::new(0),
        };
        let snap = extract(&mem, &completed());
        assert_eq!(mem.reads.get(), DIM);
        assert_eq!(snap.amplitudes.len(), DIM);
        assert_eq!(snap.probabilities[0], 0.25);
        assert_eq!(snap.probabilities[5], 0.25);
        assert_eq!(snap.total_probability, 0.5);
    }

    #[test]
    #[should_panic(expected = "before completion")]
    fn refuses_incomplete_run() {
        let mem = Memory {
            slots: [RawAmplitude::ZERO; DIM],
            reads: Cell::new(0),
        };
        let run = RunResult {
            completed: false,
            ..completed()
        };
        extract(&mem, &run);
    }
}
