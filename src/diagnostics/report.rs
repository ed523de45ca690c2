// tagged report lines; downstream bench scripts grep for these prefixes, keep them stable

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Sim,
    Bench,
    Pass,
    Fail,
    State,
    Warn,
}

impl Tag {
    pub fn prefix(&self) -> &'static str {
        match self {
            Tag::Sim => "[SIM]",
            Tag::Bench => "[BENCH]",
            Tag::Pass => "[TB][PASS]",
            Tag::Fail => "[TB][FAIL]",
            Tag::State => "[TB][STATE]",
            Tag::Warn => "[TB][WARN]",
        }
    }

    /// Failures and warnings go to the error stream, everything else to stdout.
    pub fn is_error_stream(&self) -> bool {
        matches!(self, Tag::Fail | Tag::Warn)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

pub trait Reporter {
    fn emit(&mut self, tag: Tag, line: &str);

    fn warn(&mut self, line: &str) {
        self.emit(Tag::Warn, line);
    }
}

/// Writes report lines to stdout / stderr.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn emit(&mut self, tag: Tag, line: &str) {
        if tag.is_error_stream() {
            eprintln!("{} {}", tag, line);
        } else {
            println!("{} {}", tag, line);
        }
    }
}

/// Keeps report lines in memory, for tests and for the bench driver.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    pub lines: Vec<(Tag, String)>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        MemoryReporter::default()
    }

    pub fn has(&self, tag: Tag, needle: &str) -> bool {
        self.lines.iter().any(|(t, l)| *t == tag && l.contains(needle))
    }

    pub fn count(&self, tag: Tag) -> usize {
        self.lines.iter().filter(|(t, _)| *t == tag).count()
    }
}

impl Reporter for MemoryReporter {
    fn emit(&mut self, tag: Tag, line: &str) {
        self.lines.push((tag, line.to_string()));
    }
}
