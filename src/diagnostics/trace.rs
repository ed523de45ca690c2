// waveform trace sinks. the vcd writer only emits signals that changed since the last sample.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use vcd_ng::{IdCode, TimescaleUnit, Value, VecValue, Writer};

use crate::device::Signals;

pub trait TraceSink {
    /// Records the port values at simulated time `time`.
    fn dump(&mut self, time: u64, signals: &Signals);

    /// Flushes and releases the artifact. Must be safe to call more than once.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Sink used when tracing is off.
#[derive(Debug, Default)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn dump(&mut self, _time: u64, _signals: &Signals) {}

    fn close(&mut self) {}

    fn is_open(&self) -> bool {
        false
    }
}

struct WireIds {
    clk: IdCode,
    start: IdCode,
    done: IdCode,
    prog_id: IdCode,
    cycle_count: IdCode,
}

const PROG_ID_WIDTH: u32 = 8;
const CYCLE_COUNT_WIDTH: u32 = 32;

pub struct VcdTrace {
    path: PathBuf,
    writer: Option<Writer<BufWriter<File>>>,
    ids: WireIds,
    last: Option<Signals>,
    samples: u64,
}

impl VcdTrace {
    /// Creates the file and writes the header. Does not create parent directories.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let mut writer = Writer::new(BufWriter::new(file));
        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module("qc_top")?;
        let ids = WireIds {
            clk: writer.add_wire(1, "clk")?,
            start: writer.add_wire(1, "start")?,
            done: writer.add_wire(1, "done")?,
            prog_id: writer.add_wire(PROG_ID_WIDTH, "prog_id")?,
            cycle_count: writer.add_wire(CYCLE_COUNT_WIDTH, "cycle_count")?,
        };
        writer.upscope()?;
        writer.enddefinitions()?;
        log::debug!("trace: opened {}", path.display());
        Ok(VcdTrace {
            path,
            writer: Some(writer),
            ids,
            last: None,
            samples: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    fn write_sample(&mut self, time: u64, s: &Signals) -> io::Result<()> {
        let Some(w) = self.writer.as_mut() else {
            return Ok(());
        };
        let prev = self.last;
        let changed = |f: fn(&Signals) -> u64| prev.map_or(true, |p| f(&p) != f(s));

        w.timestamp(time)?;
        if changed(|x| x.clk as u64) {
            w.change_scalar(self.ids.clk, bit(s.clk))?;
        }
        if changed(|x| x.start as u64) {
            w.change_scalar(self.ids.start, bit(s.start))?;
        }
        if changed(|x| x.done as u64) {
            w.change_scalar(self.ids.done, bit(s.done))?;
        }
        if changed(|x| x.prog_id as u64) {
            let v = VecValue::from(bits(s.prog_id as u64, PROG_ID_WIDTH));
            w.change_vector(self.ids.prog_id, &v)?;
        }
        if changed(|x| x.cycle_count as u64) {
            let v = VecValue::from(bits(s.cycle_count as u64, CYCLE_COUNT_WIDTH));
            w.change_vector(self.ids.cycle_count, &v)?;
        }
        self.last = Some(*s);
        self.samples += 1;
        Ok(())
    }
}

fn bit(level: bool) -> Value {
    if level {
        Value::V1
    } else {
        Value::V0
    }
}

// msb first, as vcd expects
fn bits(v: u64, width: u32) -> Vec<Value> {
    (0..width).rev().map(|b| bit((v >> b) & 1 == 1)).collect()
}

impl TraceSink for VcdTrace {
    fn dump(&mut self, time: u64, signals: &Signals) {
        if let Err(e) = self.write_sample(time, signals) {
            // tracing is best effort, stop writing rather than fail the run
            log::warn!("trace: write to {} failed, disabling: {}", self.path.display(), e);
            self.writer = None;
        }
    }

    fn close(&mut self) {
        if self.writer.take().is_some() {
            log::debug!("trace: closed {} after {} samples", self.path.display(), self.samples);
        }
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

impl Drop for VcdTrace {
    fn drop(&mut self) {
        self.close();
    }
}
