use std::fmt;

use crate::decode::Instruction;
use crate::error::DecodeError;

/// Cells in the reference machine.
pub const MEMORY_CELLS: usize = 32;

/// One addressable word. Its role is decided by how it is read: code when
/// fetched, data when an instruction loads or stores it.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub enum Cell {
    #[default]
    Empty,
    Literal(i64),
    Instruction(Instruction),
    Label(String),
    Comment(String),
    /// Code that failed to decode. Faults only when fetched.
    Malformed {
        text: String,
        error: DecodeError,
    },
}

/// Coarse role of a cell, for display and skip reporting.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CellKind {
    Empty,
    Literal,
    Instruction,
    Label,
    Comment,
    Malformed,
}

impl Cell {
    pub fn kind(&self) -> CellKind {
        match self {
            Cell::Empty => CellKind::Empty,
            Cell::Literal(_) => CellKind::Literal,
            Cell::Instruction(_) => CellKind::Instruction,
            Cell::Label(_) => CellKind::Label,
            Cell::Comment(_) => CellKind::Comment,
            Cell::Malformed { .. } => CellKind::Malformed,
        }
    }

    /// Value of the cell when read as data.
    pub fn number(&self) -> Option<i64> {
        match self {
            Cell::Literal(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Literal(value) => write!(f, "{value}"),
            Cell::Instruction(instruction) => write!(f, "{instruction}"),
            Cell::Label(name) => write!(f, "{name}:"),
            Cell::Comment(text) if text.is_empty() => write!(f, "#"),
            Cell::Comment(text) => write!(f, "# {text}"),
            Cell::Malformed { text, .. } => {
                // Normalise whitespace like every other cell
                let mut tokens = text.split_whitespace();
                if let Some(first) = tokens.next() {
                    write!(f, "{first}")?;
                }
                for token in tokens {
                    write!(f, " {token}")?;
                }
                Ok(())
            }
        }
    }
}

/// Shared code and data store. Fixed size once created.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Memory {
    cells: Box<[Cell]>,
}

impl Memory {
    pub fn new(capacity: usize) -> Self {
        Memory {
            cells: vec![Cell::Empty; capacity].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, address: usize) -> Option<&Cell> {
        self.cells.get(address)
    }

    /// Replace a cell. Returns `false` if `address` is outside memory.
    pub fn set(&mut self, address: usize, cell: Cell) -> bool {
        match self.cells.get_mut(address) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    /// Bounds-check a signed operand as an address.
    pub fn index(&self, address: i64) -> Option<usize> {
        usize::try_from(address)
            .ok()
            .filter(|address| *address < self.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Canonical text of every cell, in address order.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.cells.iter().map(Cell::to_string)
    }
}

impl<'a> IntoIterator for &'a Memory {
    type Item = &'a Cell;
    type IntoIter = std::slice::Iter<'a, Cell>;
    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}
