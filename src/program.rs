use crate::decode::{classify, decode, Instruction, LineKind, Operand, RawOperand};
use crate::error::LoadError;
use crate::memory::{Cell, Memory};
use crate::symbol::SymbolTable;

/// Program text as supplied by the user, one line per memory cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    lines: Vec<String>,
}

impl Program {
    /// Split source text on line breaks. A trailing newline does not add a cell.
    pub fn from_source(src: &str) -> Self {
        Program {
            lines: src.lines().map(str::to_string).collect(),
        }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Program {
            lines: lines
                .into_iter()
                .map(|line| line.into().trim_end_matches(['\r', '\n']).to_string())
                .collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Text used to render diagnostics.
    pub fn source(&self) -> String {
        self.lines.join("\n")
    }

    /// Fill a memory of `capacity` cells and build the symbol table.
    ///
    /// Code that fails to decode is stored as [`Cell::Malformed`] and only
    /// faults when fetched. Undefined labels fail here.
    pub fn load(&self, capacity: usize) -> Result<(Memory, SymbolTable), LoadError> {
        if self.lines.len() > capacity {
            return Err(LoadError::ProgramTooLarge {
                lines: self.lines.len(),
                capacity,
            });
        }

        let symbols = SymbolTable::build(&self.lines)?;
        let mut memory = Memory::new(capacity);
        for (address, line) in self.lines.iter().enumerate() {
            let cell = load_cell(line, address, &symbols)?;
            memory.set(address, cell);
        }
        Ok((memory, symbols))
    }
}

fn load_cell(line: &str, address: usize, symbols: &SymbolTable) -> Result<Cell, LoadError> {
    let text = match classify(line) {
        LineKind::Empty => return Ok(Cell::Empty),
        LineKind::Comment(text) => return Ok(Cell::Comment(text.to_string())),
        LineKind::Label(name) => return Ok(Cell::Label(name.to_string())),
        LineKind::Literal(value) => return Ok(Cell::Literal(value)),
        LineKind::Code(text) => text,
    };

    let (opcode, operand) = match decode(text) {
        Ok(decoded) => decoded,
        Err(error) => {
            return Ok(Cell::Malformed {
                text: text.to_string(),
                error,
            })
        }
    };

    let operand = match operand {
        None => None,
        Some(RawOperand::Number(value)) => Some(Operand::Number(value)),
        Some(RawOperand::Label(name)) => {
            let target = symbols
                .get(name)
                .ok_or_else(|| LoadError::UndefinedLabel {
                    name: name.to_string(),
                    address,
                    line: text.to_string(),
                })?;
            Some(Operand::Label {
                name: name.to_string(),
                address: target,
            })
        }
    };

    Ok(Cell::Instruction(Instruction { opcode, operand }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Opcode;
    use crate::error::DecodeError;

    #[test]
    fn splits_source() {
        let program = Program::from_source("LOM 3\r\nOUT\nFIN\n7\n");
        assert_eq!(program.lines(), ["LOM 3", "OUT", "FIN", "7"]);
        assert_eq!(program.source(), "LOM 3\nOUT\nFIN\n7");
    }

    #[test]
    fn loads_cells() {
        let program = Program::from_lines(["start:", "JUZ start", "# hi", "42", "BAD", ""]);
        let (memory, symbols) = program.load(8).unwrap();
        assert_eq!(symbols.get("start"), Some(0));
        assert_eq!(memory.len(), 8);
        assert_eq!(memory.get(0), Some(&Cell::Label("start".into())));
        assert_eq!(
            memory.get(1),
            Some(&Cell::Instruction(Instruction {
                opcode: Opcode::Juz,
                operand: Some(Operand::Label {
                    name: "start".into(),
                    address: 0
                }),
            }))
        );
        assert_eq!(memory.get(2), Some(&Cell::Comment("hi".into())));
        assert_eq!(memory.get(3), Some(&Cell::Literal(42)));
        assert_eq!(
            memory.get(4),
            Some(&Cell::Malformed {
                text: "BAD".into(),
                error: DecodeError::InvalidOpcode {
                    mnemonic: "BAD".into()
                },
            })
        );
        assert_eq!(memory.get(5), Some(&Cell::Empty));
        assert_eq!(memory.get(7), Some(&Cell::Empty));
    }

    #[test]
    fn load_errors() {
        assert_eq!(
            Program::from_lines(["JUM nowhere", "FIN"]).load(32),
            Err(LoadError::UndefinedLabel {
                name: "nowhere".into(),
                address: 0,
                line: "JUM nowhere".into(),
            })
        );
        assert_eq!(
            Program::from_lines(["INR"; 5]).load(4),
            Err(LoadError::ProgramTooLarge {
                lines: 5,
                capacity: 4
            })
        );
        assert!(matches!(
            Program::from_lines(["a:", "a:", "FIN"]).load(32),
            Err(LoadError::DuplicateLabel { .. })
        ));
    }
}
