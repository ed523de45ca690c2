use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use qctb::bench::{self, BenchOptions, Subset};
use qctb::catalogue::{self, CATALOGUE};
use qctb::config::{self, HarnessConfig};
use qctb::controller::DEFAULT_MAX_HALF_CYCLES;
use qctb::diagnostics::{ConsoleReporter, Reporter, Tag};
use qctb::{harness, Fault, QcCore};


const QCTB_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_BENCH_OUT: &str = "experiments/results/results.csv";

#[derive(Parser, Debug)]
#[command(name = "qctb", version = QCTB_VERSION,
    about = "qctb - cycle-accurate testbench for the fixed-point quantum circuit core.\n\n\
             Without a subcommand, runs one program: 'qctb --prog bell2' or 'qctb +prog=bell2'.",
    long_about = None,
    args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Program to run (see 'qctb list').
    #[arg(long, default_value = config::DEFAULT_PROGRAM)]
    prog: String,
    /// Clock frequency used to convert cycles to microseconds.
    #[arg(long, env = "FCLK_HZ", default_value_t = config::DEFAULT_FCLK_HZ)]
    fclk_hz: f64,
    /// Dump every amplitude and export the state csv. Also enabled by DUMP_STATE.
    #[arg(long)]
    dump_state: bool,
    /// Write a waveform trace. Also enabled by DUMP_VCD.
    #[arg(long)]
    dump_vcd: bool,
    /// Waveform trace location.
    #[arg(long, default_value = config::DEFAULT_VCD_PATH)]
    vcd_path: PathBuf,
    /// Write device coverage as json to this path.
    #[arg(long, env = "QC_COVERAGE", value_name = "PATH")]
    coverage: Option<PathBuf>,
    /// Directory for state csv exports. Not created if missing.
    #[arg(long, default_value = config::DEFAULT_RESULTS_DIR)]
    results_dir: PathBuf,
    /// Give up waiting for done after this many half cycles.
    #[arg(long, default_value_t = DEFAULT_MAX_HALF_CYCLES)]
    max_half_cycles: u64,
    #[arg(long, value_enum, default_value_t = Fault::None, hide = true)]
    fault: Fault,
}

impl RunArgs {
    fn into_config(self) -> HarnessConfig {
        HarnessConfig {
            prog: self.prog,
            fclk_hz: self.fclk_hz,
            dump_state: self.dump_state,
            dump_vcd: self.dump_vcd,
            vcd_path: self.vcd_path,
            coverage_path: self.coverage,
            results_dir: self.results_dir,
            max_half_cycles: self.max_half_cycles,
            fault: self.fault,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs one program on the core (the default).
    Run(RunArgs),
    /// Runs a set of programs and writes a results table.
    Bench {
        /// Named subset of the catalogue.
        #[arg(long, value_enum, conflicts_with = "prog")]
        subset: Option<Subset>,
        /// Single program.
        #[arg(long)]
        prog: Option<String>,
        /// Repetitions per program; the minimum cycle count is kept.
        #[arg(long, default_value_t = 1)]
        runs: u32,
        /// Results csv path.
        #[arg(long, default_value = DEFAULT_BENCH_OUT)]
        out: PathBuf,
        /// Exit non-zero if a strict program falls below the fidelity threshold.
        #[arg(long)]
        strict: bool,
        #[arg(long, env = "FCLK_HZ", default_value_t = config::DEFAULT_FCLK_HZ)]
        fclk_hz: f64,
        #[arg(long, default_value_t = DEFAULT_MAX_HALF_CYCLES)]
        max_half_cycles: u64,
        #[arg(long, value_enum, default_value_t = Fault::None, hide = true)]
        fault: Fault,
    },
    /// Prints the program catalogue.
    List,
    /// Prints the qctb version.
    Version,
}

fn run_single(args: RunArgs, reporter: &mut dyn Reporter) -> qctb::Result<ExitCode> {
    let mut config = args.into_config();
    config.apply_env_overrides();
    log::debug!("config: {:?}", config);
    let device = QcCore::new().with_fault(config.fault);
    harness::run(&config, device, reporter)?;
    Ok(ExitCode::SUCCESS)
}

fn dispatch(cli: Cli, reporter: &mut dyn Reporter) -> qctb::Result<ExitCode> {
    let Some(command) = cli.command else {
        return run_single(cli.run, reporter);
    };
    match command {
        Commands::Run(args) => run_single(args, reporter),
        Commands::Bench {
            subset,
            prog,
            runs,
            out,
            strict,
            fclk_hz,
            max_half_cycles,
            fault,
        } => {
            let programs = match prog {
                Some(name) => vec![catalogue::lookup(&name)?],
                None => subset.unwrap_or(Subset::All).programs(),
            };
            let opts = BenchOptions {
                programs,
                runs,
                out,
                strict,
                fclk_hz,
                max_half_cycles,
                fault,
            };
            let summary = bench::run_bench(&opts, reporter)?;
            println!("wrote {} rows to {}", summary.rows.len(), opts.out.display());
            Ok(if summary.failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::List => {
            for program in CATALOGUE {
                println!("{}", program);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version => {
            println!("qctb version {} ({})", QCTB_VERSION, bench::GIT_SHA);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = config::normalize_plusargs(std::env::args_os());
    let cli = Cli::parse_from(args);

    let mut reporter = ConsoleReporter;
    match dispatch(cli, &mut reporter) {
        Ok(code) => code,
        Err(e) => {
            reporter.emit(Tag::Fail, &e.to_string());
            ExitCode::FAILURE
        }
    }
}
