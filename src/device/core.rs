// behavioural model of qc_top: microcode sequencer + q15 amplitude memory
// state only moves on the rising clock edge, exactly like the rtl

use std::collections::BTreeMap;

use clap::ValueEnum;

use crate::device::microcode::{self, MicroOp};
use crate::device::{CoverageReport, Device, Signals, DIM, MAX_QUBITS};
use crate::fixed_point::{self, RawAmplitude, Q15_FRAC_1_SQRT_2, Q15_ONE};

/// Faults the model can be told to exhibit, for exercising the harness failure paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Fault {
    #[default]
    None,
    /// Sequencer stalls after start, `done` never rises.
    Hang,
    /// Top slot is overwritten with spurious amplitude at completion.
    Leak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Busy { pc: usize, remaining: u32 },
    Done,
}

/// Amplitude memory laid out as the rtl does: separate real and imaginary banks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmpMemory {
    pub mem_r: [i16; DIM],
    pub mem_i: [i16; DIM],
}

impl AmpMemory {
    // |0...0>, with 1.0 clipped to the largest q15 value
    fn ground() -> Self {
        let mut mem = AmpMemory {
            mem_r: [0; DIM],
            mem_i: [0; DIM],
        };
        mem.mem_r[0] = Q15_ONE;
        mem
    }

    fn get(&self, i: usize) -> RawAmplitude {
        RawAmplitude::new(self.mem_r[i], self.mem_i[i])
    }

    fn put(&mut self, i: usize, amp: RawAmplitude) {
        self.mem_r[i] = amp.re;
        self.mem_i[i] = amp.im;
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.mem_r.swap(i, j);
        self.mem_i.swap(i, j);
    }

    fn apply_h(&mut self, q: usize) {
        let mask = 1 << q;
        for i in 0..DIM {
            if i & mask == 0 {
                let j = i | mask;
                let (r0, r1) =
                    fixed_point::q15_butterfly(self.mem_r[i], self.mem_r[j], Q15_FRAC_1_SQRT_2);
                let (i0, i1) =
                    fixed_point::q15_butterfly(self.mem_i[i], self.mem_i[j], Q15_FRAC_1_SQRT_2);
                self.put(i, RawAmplitude::new(r0, i0));
                self.put(j, RawAmplitude::new(r1, i1));
            }
        }
    }

    fn apply_x(&mut self, q: usize) {
        let mask = 1 << q;
        for i in 0..DIM {
            if i & mask == 0 {
                self.swap(i, i | mask);
            }
        }
    }

    fn apply_cnot(&mut self, c: usize, t: usize) {
        let c_mask = 1 << c;
        let t_mask = 1 << t;
        for i in 0..DIM {
            if i & c_mask != 0 && i & t_mask == 0 {
                self.swap(i, i | t_mask);
            }
        }
    }

    fn apply_swap(&mut self, a: usize, b: usize) {
        let a_mask = 1 << a;
        let b_mask = 1 << b;
        for i in 0..DIM {
            // visit each pair once, from the side where bit a is set and bit b is clear
            if i & a_mask != 0 && i & b_mask == 0 {
                self.swap(i, i ^ a_mask ^ b_mask);
            }
        }
    }

    fn apply_cphase(&mut self, c: usize, t: usize, twiddle: RawAmplitude) {
        let c_mask = 1 << c;
        let t_mask = 1 << t;
        for i in 0..DIM {
            if i & c_mask != 0 && i & t_mask != 0 {
                let amp = fixed_point::q15_cmul(self.get(i), twiddle);
                self.put(i, amp);
            }
        }
    }

    fn apply_mcz(&mut self, mask: usize) {
        for i in 0..DIM {
            if i & mask == mask {
                self.mem_r[i] = fixed_point::q15_sub(0, self.mem_r[i]);
                self.mem_i[i] = fixed_point::q15_sub(0, self.mem_i[i]);
            }
        }
    }
}

#[derive(Debug, Default)]
struct CoverageCounters {
    started: u64,
    completed: u64,
    busy_cycles: u64,
    op_hits: BTreeMap<&'static str, u64>,
}

pub struct QcCore {
    clk: bool,
    start: bool,
    prog_id: u32,
    prev_clk: bool,

    done: bool,
    cycle_count: u32,

    phase: Phase,
    rom: Vec<u64>,
    mem: AmpMemory,
    fault: Fault,
    coverage: CoverageCounters,
    finalized: bool,
}

impl Default for QcCore {
    fn default() -> Self {
        QcCore::new()
    }
}

impl QcCore {
    pub fn new() -> Self {
        QcCore {
            clk: false,
            start: false,
            prog_id: 0,
            prev_clk: false,
            done: false,
            cycle_count: 0,
            phase: Phase::Idle,
            rom: Vec::new(),
            mem: AmpMemory::ground(),
            fault: Fault::None,
            coverage: CoverageCounters::default(),
            finalized: false,
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    pub fn memory(&self) -> &AmpMemory {
        &self.mem
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn posedge(&mut self) {
        match self.phase {
            Phase::Idle | Phase::Done => {
                if self.start {
                    self.launch();
                }
            }
            Phase::Busy { pc, remaining } => self.step(pc, remaining),
        }
    }

    fn launch(&mut self) {
        let Some(rom) = microcode::rom_for(self.prog_id) else {
            log::debug!("core: no microcode for prog_id {}, staying idle", self.prog_id);
            return;
        };
        self.mem = AmpMemory::ground();
        self.cycle_count = 0;
        self.done = false;
        self.coverage.started += 1;
        self.rom = rom;
        match self.rom.first().and_then(|w| MicroOp::decode(*w)) {
            Some(op) => {
                self.phase = Phase::Busy {
                    pc: 0,
                    remaining: op.latency(),
                }
            }
            None => self.finish(),
        }
    }

    fn step(&mut self, pc: usize, remaining: u32) {
        self.cycle_count = self.cycle_count.wrapping_add(1);
        self.coverage.busy_cycles += 1;

        if self.fault == Fault::Hang {
            return;
        }

        if remaining > 1 {
            self.phase = Phase::Busy {
                pc,
                remaining: remaining - 1,
            };
            return;
        }

        self.execute(self.rom[pc]);
        let next = pc + 1;
        match self.rom.get(next).map(|w| MicroOp::decode(*w)) {
            Some(Some(op)) => {
                self.phase = Phase::Busy {
                    pc: next,
                    remaining: op.latency(),
                }
            }
            // an undecodable word burns one cycle, like a nop
            Some(None) => {
                self.phase = Phase::Busy {
                    pc: next,
                    remaining: 1,
                }
            }
            None => self.finish(),
        }
    }

    fn execute(&mut self, word: u64) {
        let Some(op) = MicroOp::decode(word) else {
            *self.coverage.op_hits.entry("ILLEGAL").or_insert(0) += 1;
            return;
        };
        *self.coverage.op_hits.entry(op.mnemonic()).or_insert(0) += 1;

        let in_range = |q: u8| (q as usize) < MAX_QUBITS;
        match op {
            MicroOp::Hadamard(q) if in_range(q) => self.mem.apply_h(q as usize),
            MicroOp::BitFlip(q) if in_range(q) => self.mem.apply_x(q as usize),
            MicroOp::Cnot { control, target }
                if in_range(control) && in_range(target) && control != target =>
            {
                self.mem.apply_cnot(control as usize, target as usize)
            }
            MicroOp::Swap(a, b) if in_range(a) && in_range(b) && a != b => {
                self.mem.apply_swap(a as usize, b as usize)
            }
            MicroOp::CPhase {
                control,
                target,
                twiddle,
            } if in_range(control) && in_range(target) => {
                self.mem.apply_cphase(control as usize, target as usize, twiddle)
            }
            MicroOp::Mcz { mask } if (mask as usize) < DIM => self.mem.apply_mcz(mask as usize),
            other => log::warn!("core: dropping op with out-of-range operands: {}", other),
        }
    }

    fn finish(&mut self) {
        if self.fault == Fault::Leak {
            self.mem.put(DIM - 1, RawAmplitude::new(fixed_point::encode(0.5), 0));
        }
        self.phase = Phase::Done;
        self.done = true;
        self.coverage.completed += 1;
    }
}

impl Device for QcCore {
    fn set_clk(&mut self, level: bool) {
        self.clk = level;
    }

    fn set_start(&mut self, level: bool) {
        self.start = level;
    }

    fn set_prog_id(&mut self, prog_id: u32) {
        self.prog_id = prog_id;
    }

    fn eval(&mut self) {
        if self.clk && !self.prev_clk {
            self.posedge();
        }
        self.prev_clk = self.clk;
    }

    fn signals(&self) -> Signals {
        Signals {
            clk: self.clk,
            start: self.start,
            done: self.done,
            prog_id: self.prog_id,
            cycle_count: self.cycle_count,
        }
    }

    fn read_slot(&self, index: usize) -> RawAmplitude {
        self.mem.get(index)
    }

    fn finalize(&mut self) {
        if !self.finalized {
            log::debug!(
                "core: finalize after {} started / {} completed programs",
                self.coverage.started,
                self.coverage.completed
            );
        }
        self.finalized = true;
    }

    fn coverage(&self) -> Option<CoverageReport> {
        Some(CoverageReport {
            programs_started: self.coverage.started,
            programs_completed: self.coverage.completed,
            busy_cycles: self.coverage.busy_cycles,
            op_hits: self
                .coverage
                .op_hits
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::{decode_raw, magnitude_squared};

    // clocks the core by hand: one full cycle per call
    fn cycle(core: &mut QcCore) {
        core.set_clk(true);
        core.eval();
        core.set_clk(false);
        core.eval();
    }

    fn run_to_done(core: &mut QcCore, prog_id: u32) -> u32 {
        core.set_prog_id(prog_id);
        core.set_start(true);
        cycle(core);
        core.set_start(false);
        for _ in 0..10_000 {
            cycle(core);
            if core.done() {
                return core.cycle_count();
            }
        }
        panic!("core never finished prog_id {}", prog_id);
    }

    fn probs(core: &QcCore) -> Vec<f64> {
        (0..DIM).map(|i| magnitude_squared(decode_raw(core.read_slot(i)))).collect()
    }

    #[test]
    fn holds_ground_state_until_started() {
        let mut core = QcCore::new();
        for _ in 0..20 {
            cycle(&mut core);
        }
        assert!(!core.done());
        assert_eq!(core.read_slot(0), RawAmplitude::new(Q15_ONE, 0));
    }

    #[test]
    fn start_only_counts_on_rising_edge() {
        let mut core = QcCore::new();
        core.set_prog_id(3);
        core.set_start(true);
        // clk stays low, nothing should happen
        core.eval();
        core.eval();
        assert_eq!(core.phase, Phase::Idle);
        core.set_clk(true);
        core.eval();
        assert!(matches!(core.phase, Phase::Busy { pc: 0, .. }));
    }

    #[test]
    fn bell_program_populates_00_and_11() {
        let mut core = QcCore::new();
        let cycles = run_to_done(&mut core, 3);
        // two pairwise ops of 10 cycles each
        assert_eq!(cycles, 20);
        let p = probs(&core);
        assert!((p[0] - 0.5).abs() < 1e-3);
        assert!((p[3] - 0.5).abs() < 1e-3);
        assert!(p[1] < 1e-6 && p[2] < 1e-6);
    }

    #[test]
    fn grover2_amplifies_marked_state() {
        let mut core = QcCore::new();
        run_to_done(&mut core, 2);
        let p = probs(&core);
        assert!(p[3] > 0.99, "p[3] = {}", p[3]);
    }

    #[test]
    fn unknown_prog_id_stays_idle() {
        let mut core = QcCore::new();
        core.set_prog_id(42);
        core.set_start(true);
        cycle(&mut core);
        core.set_start(false);
        for _ in 0..100 {
            cycle(&mut core);
        }
        assert!(!core.done());
        assert_eq!(core.coverage().unwrap().programs_started, 0);
    }

    #[test]
    fn hang_fault_never_completes() {
        let mut core = QcCore::new().with_fault(Fault::Hang);
        core.set_prog_id(0);
        core.set_start(true);
        cycle(&mut core);
        core.set_start(false);
        for _ in 0..1000 {
            cycle(&mut core);
        }
        assert!(!core.done());
        assert_eq!(core.cycle_count(), 1000);
    }

    #[test]
    fn coverage_counts_ops() {
        let mut core = QcCore::new();
        run_to_done(&mut core, 3);
        let cov = core.coverage().unwrap();
        assert_eq!(cov.programs_completed, 1);
        assert_eq!(cov.op_hits.get("H"), Some(&1));
        assert_eq!(cov.op_hits.get("CNOT"), Some(&1));
    }

    #[test]
    fn restart_after_done_reruns_from_ground() {
        let mut core = QcCore::new();
        let first = run_to_done(&mut core, 0);
        let p_first = probs(&core);
        let second = run_to_done(&mut core, 0);
        assert_eq!(first, second);
        assert_eq!(p_first, probs(&core));
    }
}
