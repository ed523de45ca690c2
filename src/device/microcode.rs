// microcode for the behavioural core
// each op packs into one 64-bit rom word:
//   [63:56] opcode  [55:48] operand a  [47:40] operand b  [31:16] twiddle re  [15:0] twiddle im

use std::f64::consts::PI;
use std::fmt;

use crate::device::DIM;
use crate::fixed_point::{self, RawAmplitude};

const OP_H: u8 = 0x05;
const OP_X: u8 = 0x07;
const OP_SWAP: u8 = 0x0B;
const OP_CNOT: u8 = 0x17;
const OP_MCZ: u8 = 0x1E;
const OP_CPHASE: u8 = 0x36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOp {
    Hadamard(u8),
    BitFlip(u8),
    Cnot { control: u8, target: u8 },
    Swap(u8, u8),
    /// Controlled phase with a precomputed Q15 twiddle `e^(i*theta)`.
    CPhase { control: u8, target: u8, twiddle: RawAmplitude },
    /// Sign flip on every basis state whose bits cover `mask`.
    Mcz { mask: u8 },
}

impl MicroOp {
    pub fn cphase(control: u8, target: u8, theta: f64) -> Self {
        MicroOp::CPhase {
            control,
            target,
            twiddle: RawAmplitude::new(
                fixed_point::encode(theta.cos()),
                fixed_point::encode(theta.sin()),
            ),
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            MicroOp::Hadamard(_) => OP_H,
            MicroOp::BitFlip(_) => OP_X,
            MicroOp::Cnot { .. } => OP_CNOT,
            MicroOp::Swap(..) => OP_SWAP,
            MicroOp::CPhase { .. } => OP_CPHASE,
            MicroOp::Mcz { .. } => OP_MCZ,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            MicroOp::Hadamard(_) => "H",
            MicroOp::BitFlip(_) => "X",
            MicroOp::Cnot { .. } => "CNOT",
            MicroOp::Swap(..) => "SWAP",
            MicroOp::CPhase { .. } => "CPHASE",
            MicroOp::Mcz { .. } => "MCZ",
        }
    }

    /// Cycles the datapath spends on this op before the result is written back.
    /// Pairwise ops stream `DIM / 2` butterflies, diagonal ops touch a quarter of memory.
    pub fn latency(&self) -> u32 {
        match self {
            MicroOp::Hadamard(_)
            | MicroOp::BitFlip(_)
            | MicroOp::Cnot { .. }
            | MicroOp::Swap(..) => {
                2 + (DIM as u32) / 2
            }
            MicroOp::CPhase { .. } | MicroOp::Mcz { .. } => 1 + (DIM as u32) / 4,
        }
    }

    pub fn encode(&self) -> u64 {
        let (a, b, tw) = match *self {
            MicroOp::Hadamard(q) | MicroOp::BitFlip(q) => (q, 0, RawAmplitude::ZERO),
            MicroOp::Cnot { control, target } => (control, target, RawAmplitude::ZERO),
            MicroOp::Swap(q1, q2) => (q1, q2, RawAmplitude::ZERO),
            MicroOp::CPhase { control, target, twiddle } => (control, target, twiddle),
            MicroOp::Mcz { mask } => (mask, 0, RawAmplitude::ZERO),
        };
        ((self.opcode() as u64) << 56)
            | ((a as u64) << 48)
            | ((b as u64) << 40)
            | ((tw.re as u16 as u64) << 16)
            | (tw.im as u16 as u64)
    }

    pub fn decode(word: u64) -> Option<MicroOp> {
        let opcode = (word >> 56) as u8;
        let a = (word >> 48) as u8;
        let b = (word >> 40) as u8;
        let twiddle = RawAmplitude::new((word >> 16) as u16 as i16, word as u16 as i16);
        let op = match opcode {
            OP_H => MicroOp::Hadamard(a),
            OP_X => MicroOp::BitFlip(a),
            OP_CNOT => MicroOp::Cnot { control: a, target: b },
            OP_SWAP => MicroOp::Swap(a, b),
            OP_CPHASE => MicroOp::CPhase { control: a, target: b, twiddle },
            OP_MCZ => MicroOp::Mcz { mask: a },
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for MicroOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MicroOp::Hadamard(q) | MicroOp::BitFlip(q) => write!(f, "{} q{}", self.mnemonic(), q),
            MicroOp::Cnot { control, target } => write!(f, "CNOT q{} -> q{}", control, target),
            MicroOp::Swap(a, b) => write!(f, "SWAP q{} q{}", a, b),
            MicroOp::CPhase { control, target, twiddle } => write!(
                f,
                "CPHASE q{} q{} ({:.5}, {:.5})",
                control,
                target,
                fixed_point::q15_to_f64(twiddle.re),
                fixed_point::q15_to_f64(twiddle.im)
            ),
            MicroOp::Mcz { mask } => write!(f, "MCZ mask=0b{:04b}", mask),
        }
    }
}

/// QFT over qubits `0..k`, most significant qubit first, finished by bit-reversal swaps.
pub fn qft(k: u8) -> Vec<MicroOp> {
    let mut ops = Vec::new();
    for j in (0..k).rev() {
        ops.push(MicroOp::Hadamard(j));
        for m in (0..j).rev() {
            let theta = PI / (1u32 << (j - m)) as f64;
            ops.push(MicroOp::cphase(m, j, theta));
        }
    }
    for i in 0..k / 2 {
        ops.push(MicroOp::Swap(i, k - 1 - i));
    }
    ops
}

/// One Grover iteration over qubits `0..k` marking `|1...1>`.
pub fn grover(k: u8) -> Vec<MicroOp> {
    let mask = ((1u16 << k) - 1) as u8;
    let mut ops = Vec::new();
    ops.extend((0..k).map(MicroOp::Hadamard));
    // oracle
    ops.push(MicroOp::Mcz { mask });
    // diffusion: H X MCZ X H
    ops.extend((0..k).map(MicroOp::Hadamard));
    ops.extend((0..k).map(MicroOp::BitFlip));
    ops.push(MicroOp::Mcz { mask });
    ops.extend((0..k).map(MicroOp::BitFlip));
    ops.extend((0..k).map(MicroOp::Hadamard));
    ops
}

/// `(|00> + |11>) / sqrt(2)` on qubits 0 and 1.
pub fn bell() -> Vec<MicroOp> {
    vec![
        MicroOp::Hadamard(0),
        MicroOp::Cnot { control: 0, target: 1 },
    ]
}

fn qft2() -> Vec<MicroOp> {
    qft(2)
}

fn qft3() -> Vec<MicroOp> {
    qft(3)
}

fn qft4() -> Vec<MicroOp> {
    qft(4)
}

fn grover2() -> Vec<MicroOp> {
    grover(2)
}

fn grover3() -> Vec<MicroOp> {
    grover(3)
}

fn grover4() -> Vec<MicroOp> {
    grover(4)
}

// program id -> rom builder, mirrors the id map burnt into the core
const ROM_TABLE: &[(u32, fn() -> Vec<MicroOp>)] = &[
    (0, qft2),
    (1, qft4),
    (2, grover2),
    (3, bell),
    (4, qft3),
    (5, grover3),
    (6, grover4),
];

/// Assembled rom image for a program id, `None` when the id has no microcode.
pub fn rom_for(prog_id: u32) -> Option<Vec<u64>> {
    ROM_TABLE
        .iter()
        .find(|(id, _)| *id == prog_id)
        .map(|(_, build)| build().iter().map(MicroOp::encode).collect())
}

pub fn rom_ids() -> impl Iterator<Item = u32> {
    ROM_TABLE.iter().map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_decode_back_to_the_same_op() {
        let ops = [
            MicroOp::Hadamard(3),
            MicroOp::Cnot { control: 0, target: 1 },
            MicroOp::cphase(1, 3, -PI / 4.0),
            MicroOp::Mcz { mask: 0b1111 },
        ];
        for op in ops {
            assert_eq!(MicroOp::decode(op.encode()), Some(op));
        }
    }

    #[test]
    fn unknown_opcode_does_not_decode() {
        assert_eq!(MicroOp::decode(0xFF << 56), None);
    }

    #[test]
    fn pi_twiddle_is_minus_one() {
        match MicroOp::cphase(0, 1, PI) {
            MicroOp::CPhase { twiddle, .. } => {
                assert_eq!(twiddle.re, i16::MIN);
                assert_eq!(twiddle.im, 0);
            }
            other => panic!("unexpected op {}", other),
        }
    }

    #[test]
    fn qft4_has_expected_gate_count() {
        // 4 hadamards, 6 controlled phases, 2 swaps
        let ops = qft(4);
        assert_eq!(ops.len(), 12);
        assert_eq!(ops.iter().filter(|op| matches!(op, MicroOp::Swap(..))).count(), 2);
    }

    #[test]
    fn every_rom_id_assembles() {
        for id in rom_ids() {
            let rom = rom_for(id).expect("listed id must assemble");
            assert!(!rom.is_empty());
        }
        assert!(rom_for(99).is_none());
    }
}
