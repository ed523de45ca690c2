// testbench library for the fixed-point quantum circuit core.
// the binary in main.rs is a thin clap front end over `harness` and `bench`.

pub mod bench; // batch runs + results table
pub mod catalogue; // program table
pub mod config;
pub mod controller; // clock/start protocol
pub mod device; // device trait + behavioural core
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod fixed_point; // q15 decode and arithmetic
pub mod harness;
pub mod oracle;
pub mod reference; // f64 ideal states

pub use catalogue::{lookup, ProgramDescriptor, CATALOGUE};
pub use config::HarnessConfig;
pub use controller::{RunController, RunResult};
pub use device::{Device, Fault, QcCore};
pub use error::{HarnessError, Result};
pub use harness::RunOutcome;
pub use oracle::Verdict;
