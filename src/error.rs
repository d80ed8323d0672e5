use std::{error::Error, fmt, ops::Range};

use miette::{miette, LabeledSpan, Report, Severity};

use crate::decode::Opcode;

/// Program rejected before any step runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadError {
    DuplicateLabel {
        name: String,
        first: usize,
        second: usize,
    },
    UndefinedLabel {
        name: String,
        address: usize,
        line: String,
    },
    ProgramTooLarge {
        lines: usize,
        capacity: usize,
    },
}

/// Instruction text that cannot be turned into an opcode and operand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    InvalidOpcode { mnemonic: String },
    MissingOperand { opcode: Opcode },
    /// Only jumps may name a label.
    LabelOperand { opcode: Opcode, label: String },
}

/// Fatal error raised by a step. The machine is faulted afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuntimeError {
    Decode {
        address: usize,
        line: String,
        error: DecodeError,
    },
    /// Operand or jump target outside memory.
    InvalidAddress {
        address: usize,
        target: i64,
        line: String,
    },
    /// Cell read as data does not hold a number.
    NotANumber {
        address: usize,
        target: usize,
        line: String,
    },
    NoInput {
        address: usize,
        line: String,
    },
    /// `MUL` counter would never reach zero.
    InvalidMultiplier {
        address: usize,
        value: i64,
        line: String,
    },
    Overflow {
        address: usize,
        line: String,
    },
    EmptyCell {
        address: usize,
    },
    PcOutOfBounds {
        pc: usize,
    },
    /// A previous step failed.
    Faulted,
}

impl Error for LoadError {}
impl Error for DecodeError {}
impl Error for RuntimeError {}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateLabel {
                name,
                first,
                second,
            } => write!(
                f,
                "Label `{}` defined twice (at {} and {})",
                name, first, second
            ),
            Self::UndefinedLabel {
                name,
                address,
                line,
            } => write!(
                f,
                "Undefined label `{}` referenced at {}: `{}`",
                name, address, line
            ),
            Self::ProgramTooLarge { lines, capacity } => write!(
                f,
                "Program has {} lines but memory holds {} cells",
                lines, capacity
            ),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOpcode { mnemonic } => write!(f, "Invalid opcode `{}`", mnemonic),
            Self::MissingOperand { opcode } => write!(f, "`{}` requires an operand", opcode),
            Self::LabelOperand { opcode, label } => write!(
                f,
                "`{}` expects a number, found label `{}`",
                opcode, label
            ),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode {
                address,
                line,
                error,
            } => write!(f, "{} at {}: `{}`", error, address, line),
            Self::InvalidAddress {
                address,
                target,
                line,
            } => write!(
                f,
                "Address {} is outside memory at {}: `{}`",
                target, address, line
            ),
            Self::NotANumber {
                address,
                target,
                line,
            } => write!(
                f,
                "Memory cell {} does not hold a number at {}: `{}`",
                target, address, line
            ),
            Self::NoInput { address, line } => {
                write!(f, "Input register is unset at {}: `{}`", address, line)
            }
            Self::InvalidMultiplier {
                address,
                value,
                line,
            } => write!(
                f,
                "Multiplier {} must be positive at {}: `{}`",
                value, address, line
            ),
            Self::Overflow { address, line } => {
                write!(f, "Integer overflow at {}: `{}`", address, line)
            }
            Self::EmptyCell { address } => write!(f, "Fetched empty cell at {}", address),
            Self::PcOutOfBounds { pc } => write!(f, "Program counter {} is outside memory", pc),
            Self::Faulted => write!(f, "Machine has faulted and must be reloaded"),
        }
    }
}

impl RuntimeError {
    /// Address of the instruction that raised the error, if any.
    pub fn address(&self) -> Option<usize> {
        match self {
            Self::Decode { address, .. }
            | Self::InvalidAddress { address, .. }
            | Self::NotANumber { address, .. }
            | Self::NoInput { address, .. }
            | Self::InvalidMultiplier { address, .. }
            | Self::Overflow { address, .. }
            | Self::EmptyCell { address } => Some(*address),
            Self::PcOutOfBounds { .. } | Self::Faulted => None,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "run::decode",
            Self::InvalidAddress { .. } => "run::address",
            Self::NotANumber { .. } => "run::not_a_number",
            Self::NoInput { .. } => "run::no_input",
            Self::InvalidMultiplier { .. } => "run::multiplier",
            Self::Overflow { .. } => "run::overflow",
            Self::EmptyCell { .. } => "run::empty_cell",
            Self::PcOutOfBounds { .. } => "run::pc",
            Self::Faulted => "run::faulted",
        }
    }

    fn help(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "check the list of available instructions in the documentation.",
            Self::InvalidAddress { .. } | Self::PcOutOfBounds { .. } => {
                "addresses range from 0 to the memory size minus one."
            }
            Self::NotANumber { .. } => "only cells holding a number can be read as data.",
            Self::NoInput { .. } => "set the input register with `--input` before running.",
            Self::InvalidMultiplier { .. } => {
                "MUL counts up to zero, so the multiplier must be at least 1."
            }
            Self::Overflow { .. } => "registers hold 64-bit signed integers.",
            Self::EmptyCell { .. } => "make sure the program ends with FIN.",
            Self::Faulted => "reload the program to continue.",
        }
    }

    /// Render against the program source, highlighting the faulting line.
    pub fn report(&self, src: &str) -> Report {
        let labels = match self.address().and_then(|address| line_range(src, address)) {
            Some(range) => vec![LabeledSpan::at(range, "faulting instruction")],
            None => Vec::new(),
        };
        miette!(
            severity = Severity::Error,
            code = self.code(),
            help = self.help(),
            labels = labels,
            "{}",
            self
        )
        .with_source_code(src.to_string())
    }
}

impl LoadError {
    /// Render against the program source, highlighting the offending lines.
    pub fn report(&self, src: &str) -> Report {
        match self {
            Self::DuplicateLabel {
                name,
                first,
                second,
            } => {
                let mut labels = Vec::new();
                if let Some(range) = line_range(src, *first) {
                    labels.push(LabeledSpan::at(range, "first defined here"));
                }
                if let Some(range) = line_range(src, *second) {
                    labels.push(LabeledSpan::at(range, "duplicate label"));
                }
                miette!(
                    severity = Severity::Error,
                    code = "load::duplicate_label",
                    help = "labels are only allowed once per program",
                    labels = labels,
                    "Duplicate label `{}`",
                    name
                )
                .with_source_code(src.to_string())
            }
            Self::UndefinedLabel { name, address, .. } => {
                let labels = line_range(src, *address)
                    .map(|range| vec![LabeledSpan::at(range, "unknown label")])
                    .unwrap_or_default();
                miette!(
                    severity = Severity::Error,
                    code = "load::undefined_label",
                    help = "define the label on a line of its own, like `name:`",
                    labels = labels,
                    "Undefined label `{}`",
                    name
                )
                .with_source_code(src.to_string())
            }
            Self::ProgramTooLarge { lines, capacity } => {
                let labels = line_range(src, *capacity)
                    .map(|range| vec![LabeledSpan::at(range, "first line past the end")])
                    .unwrap_or_default();
                miette!(
                    severity = Severity::Error,
                    code = "load::too_large",
                    help = format!("memory holds {capacity} cells, one line per cell"),
                    labels = labels,
                    "Program has {} lines and does not fit in memory",
                    lines
                )
                .with_source_code(src.to_string())
            }
        }
    }
}

/// Byte range of line `index` within `src`, without its line break.
fn line_range(src: &str, index: usize) -> Option<Range<usize>> {
    let mut start = 0;
    for (i, line) in src.split('\n').enumerate() {
        let end = start + line.trim_end_matches('\r').len();
        if i == index {
            return Some(start..end);
        }
        start += line.len() + 1;
    }
    None
}
