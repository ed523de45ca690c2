//! Best-effort side artifacts: report lines, waveform trace, state csv, coverage.
//! Nothing in here can change whether a run passes.

pub mod coverage;
pub mod report;
pub mod state_csv;
pub mod trace;

pub use report::{ConsoleReporter, MemoryReporter, Reporter, Tag};
pub use trace::{NullTrace, TraceSink, VcdTrace};

use crate::extract::StateSnapshot;

/// Per-amplitude dump, one line per basis state.
pub fn dump_state(reporter: &mut dyn Reporter, program: &str, snapshot: &StateSnapshot) {
    reporter.emit(Tag::State, &format!("{} amplitudes", program));
    for (i, (amp, p)) in snapshot
        .amplitudes
        .iter()
        .zip(&snapshot.probabilities)
        .enumerate()
    {
        reporter.emit(
            Tag::State,
            &format!("  idx={} real={:.6} imag={:.6} mag2={:.6}", i, amp.re, amp.im, p),
        );
    }
}
