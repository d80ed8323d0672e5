use std::fmt;
use std::str::FromStr;

use crate::error::DecodeError;

/// Every instruction the machine understands.
///
/// Mnemonics are matched exactly, so `lom` is not `LOM`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    /// Load memory into `DR` and `ACC`.
    Lom,
    /// Store `ACC` into memory.
    Sto,
    Add,
    Sub,
    /// Repeated addition of the staged `DR`, counted by `CTR`.
    Mul,
    And,
    Or,
    Xor,
    Not,
    /// Increment `ACC`.
    Inr,
    /// Copy the input register into `ACC`.
    Inp,
    /// Copy `ACC` into the output register.
    Out,
    /// Unconditional jump.
    Jum,
    /// Jump if `ACC` is zero.
    Juz,
    Fin,
}

impl Opcode {
    pub const ALL: [Opcode; 15] = [
        Opcode::Lom,
        Opcode::Sto,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::And,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Not,
        Opcode::Inr,
        Opcode::Inp,
        Opcode::Out,
        Opcode::Jum,
        Opcode::Juz,
        Opcode::Fin,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Lom => "LOM",
            Opcode::Sto => "STO",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Not => "NOT",
            Opcode::Inr => "INR",
            Opcode::Inp => "INP",
            Opcode::Out => "OUT",
            Opcode::Jum => "JUM",
            Opcode::Juz => "JUZ",
            Opcode::Fin => "FIN",
        }
    }

    /// Whether the instruction needs an address or immediate operand. The
    /// others accept one too, and only load it into `AR`.
    pub fn requires_operand(self) -> bool {
        match self {
            Opcode::Lom
            | Opcode::Sto
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Jum
            | Opcode::Juz => true,
            Opcode::Not | Opcode::Inr | Opcode::Inp | Opcode::Out | Opcode::Fin => false,
        }
    }

    /// Jumps are the only instructions allowed to name a label.
    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Jum | Opcode::Juz)
    }
}

impl FromStr for Opcode {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Opcode::ALL
            .into_iter()
            .find(|opcode| opcode.mnemonic() == s)
            .ok_or_else(|| DecodeError::InvalidOpcode {
                mnemonic: s.to_string(),
            })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Operand after label resolution.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Operand {
    /// Address or immediate, depending on the opcode.
    Number(i64),
    /// Label bound to `address` by the symbol table.
    Label { name: String, address: usize },
}

impl Operand {
    /// Integer loaded into `AR` before dispatch.
    pub fn value(&self) -> i64 {
        match self {
            Operand::Number(value) => *value,
            Operand::Label { address, .. } => *address as i64,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Number(value) => write!(f, "{value}"),
            Operand::Label { name, .. } => f.write_str(name),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Option<Operand>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {}", self.opcode, operand),
            None => write!(f, "{}", self.opcode),
        }
    }
}

/// Operand as written in the source, before the symbol table is consulted.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RawOperand<'a> {
    Number(i64),
    Label(&'a str),
}

/// Structural role of one source line.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LineKind<'a> {
    Empty,
    /// `# ...`
    Comment(&'a str),
    /// `name:` and nothing else.
    Label(&'a str),
    /// First token is an integer.
    Literal(i64),
    /// Anything else, decoded on demand.
    Code(&'a str),
}

/// Classify a line by its shape only. Never fails: text that is neither data,
/// a label nor a comment is assumed to be code.
pub fn classify(line: &str) -> LineKind<'_> {
    let line = line.trim();
    if line.is_empty() {
        return LineKind::Empty;
    }
    if let Some(comment) = line.strip_prefix('#') {
        return LineKind::Comment(comment.trim());
    }
    if let Some(name) = label_definition(line) {
        return LineKind::Label(name);
    }
    let first = line.split_whitespace().next().unwrap_or(line);
    if let Ok(value) = first.parse::<i64>() {
        return LineKind::Literal(value);
    }
    LineKind::Code(line)
}

fn label_definition(line: &str) -> Option<&str> {
    let name = line.strip_suffix(':')?;
    if name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == ':') {
        return None;
    }
    Some(name)
}

/// Split an instruction line into its opcode and optional operand.
///
/// Every opcode accepts an operand. Tokens after the operand, such as the
/// display name in `OUT 0 display`, are ignored. The operand is only checked
/// for shape here. Label names are resolved by the caller.
pub fn decode(line: &str) -> Result<(Opcode, Option<RawOperand<'_>>), DecodeError> {
    let mut tokens = line.split_whitespace();
    let mnemonic = tokens.next().unwrap_or("");
    let opcode: Opcode = mnemonic.parse()?;

    let Some(token) = tokens.next() else {
        if opcode.requires_operand() {
            return Err(DecodeError::MissingOperand { opcode });
        }
        return Ok((opcode, None));
    };

    let operand = match token.parse::<i64>() {
        Ok(value) => RawOperand::Number(value),
        Err(_) if opcode.is_jump() => RawOperand::Label(token),
        Err(_) => {
            return Err(DecodeError::LabelOperand {
                opcode,
                label: token.to_string(),
            })
        }
    };
    Ok((opcode, Some(operand)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_lines() {
        assert_eq!(classify(""), LineKind::Empty);
        assert_eq!(classify("   "), LineKind::Empty);
        assert_eq!(classify("# add two"), LineKind::Comment("add two"));
        assert_eq!(classify("loop:"), LineKind::Label("loop"));
        assert_eq!(classify("  end:  "), LineKind::Label("end"));
        assert_eq!(classify("7"), LineKind::Literal(7));
        assert_eq!(classify("-12"), LineKind::Literal(-12));
        assert_eq!(classify("LOM 3"), LineKind::Code("LOM 3"));
        // Not a lone label definition
        assert_eq!(classify("a b:"), LineKind::Code("a b:"));
        assert_eq!(classify(":"), LineKind::Code(":"));
    }

    #[test]
    fn decodes_operands() {
        assert_eq!(decode("LOM 3"), Ok((Opcode::Lom, Some(RawOperand::Number(3)))));
        assert_eq!(decode("ADD   -1"), Ok((Opcode::Add, Some(RawOperand::Number(-1)))));
        assert_eq!(decode("JUZ end"), Ok((Opcode::Juz, Some(RawOperand::Label("end")))));
        assert_eq!(decode("JUM 4"), Ok((Opcode::Jum, Some(RawOperand::Number(4)))));
        assert_eq!(decode("FIN"), Ok((Opcode::Fin, None)));
        assert_eq!(decode("OUT"), Ok((Opcode::Out, None)));
        assert_eq!(decode("INR 5"), Ok((Opcode::Inr, Some(RawOperand::Number(5)))));
        assert_eq!(decode("FIN 0"), Ok((Opcode::Fin, Some(RawOperand::Number(0)))));
    }

    #[test]
    fn ignores_trailing_tokens() {
        assert_eq!(
            decode("OUT 0 display"),
            Ok((Opcode::Out, Some(RawOperand::Number(0))))
        );
        assert_eq!(decode("ADD 1 2"), Ok((Opcode::Add, Some(RawOperand::Number(1)))));
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(
            decode("lom 3"),
            Err(DecodeError::InvalidOpcode {
                mnemonic: "lom".into()
            })
        );
        assert_eq!(
            decode("HLT"),
            Err(DecodeError::InvalidOpcode {
                mnemonic: "HLT".into()
            })
        );
        assert_eq!(
            decode("STO"),
            Err(DecodeError::MissingOperand {
                opcode: Opcode::Sto
            })
        );
        assert_eq!(
            decode("LOM x"),
            Err(DecodeError::LabelOperand {
                opcode: Opcode::Lom,
                label: "x".into()
            })
        );
        assert_eq!(
            decode("NOT x"),
            Err(DecodeError::LabelOperand {
                opcode: Opcode::Not,
                label: "x".into()
            })
        );
    }

    #[test]
    fn mnemonics_round_trip() {
        for opcode in Opcode::ALL {
            assert_eq!(opcode.mnemonic().parse::<Opcode>(), Ok(opcode));
        }
    }
}
