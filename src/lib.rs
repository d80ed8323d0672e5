// Loading
mod decode;
pub use decode::{Instruction, Opcode, Operand};
mod memory;
pub use memory::{Cell, CellKind, Memory, MEMORY_CELLS};
mod program;
pub use program::Program;
mod symbol;
pub use symbol::SymbolTable;

// Running
mod register;
pub use register::{RegisterName, Registers, SetError};
mod runtime;
pub use runtime::{Flow, Machine, Observer, Status, StepOutcome, View};
#[macro_use]
mod output;
pub use output::{Console, Output};
mod debugger;
pub use debugger::{Debugger, DebuggerOptions};

mod error;
pub use error::{DecodeError, LoadError, RuntimeError};

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 4;
