use std::fmt;
use std::str::FromStr;

/// Execution registers of one machine.
///
/// `INPR` and `OUTR` start unset; every other register starts at zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    /// Accumulator
    pub acc: i64,
    /// Address of the next cell to fetch
    pub pc: usize,
    /// Text of the cell being executed
    pub ir: String,
    /// Resolved operand of the current instruction
    pub ar: i64,
    /// Staging register, loaded by `LOM` and consumed by `MUL`
    pub dr: i64,
    /// Repeat counter for `MUL`
    pub ctr: i64,
    pub inpr: Option<i64>,
    pub outr: Option<i64>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RegisterName {
    Acc,
    Pc,
    Ir,
    Ar,
    Dr,
    Ctr,
    Inpr,
    Outr,
}

impl RegisterName {
    pub const ALL: [RegisterName; 8] = [
        RegisterName::Acc,
        RegisterName::Pc,
        RegisterName::Ir,
        RegisterName::Ar,
        RegisterName::Dr,
        RegisterName::Ctr,
        RegisterName::Inpr,
        RegisterName::Outr,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RegisterName::Acc => "ACC",
            RegisterName::Pc => "PC",
            RegisterName::Ir => "IR",
            RegisterName::Ar => "AR",
            RegisterName::Dr => "DR",
            RegisterName::Ctr => "CTR",
            RegisterName::Inpr => "INPR",
            RegisterName::Outr => "OUTR",
        }
    }
}

impl FromStr for RegisterName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegisterName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

impl fmt::Display for RegisterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a register write was refused.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SetError {
    /// `IR` only mirrors the executing cell.
    ReadOnly,
    /// `PC` cannot be negative.
    Negative,
}

impl Registers {
    /// Integer value of a register. `IR` holds text and is never numeric.
    pub fn get(&self, name: RegisterName) -> Option<i64> {
        match name {
            RegisterName::Acc => Some(self.acc),
            RegisterName::Pc => Some(self.pc as i64),
            RegisterName::Ir => None,
            RegisterName::Ar => Some(self.ar),
            RegisterName::Dr => Some(self.dr),
            RegisterName::Ctr => Some(self.ctr),
            RegisterName::Inpr => self.inpr,
            RegisterName::Outr => self.outr,
        }
    }

    pub fn set(&mut self, name: RegisterName, value: i64) -> Result<(), SetError> {
        match name {
            RegisterName::Acc => self.acc = value,
            RegisterName::Pc => self.pc = usize::try_from(value).map_err(|_| SetError::Negative)?,
            RegisterName::Ir => return Err(SetError::ReadOnly),
            RegisterName::Ar => self.ar = value,
            RegisterName::Dr => self.dr = value,
            RegisterName::Ctr => self.ctr = value,
            RegisterName::Inpr => self.inpr = Some(value),
            RegisterName::Outr => self.outr = Some(value),
        }
        Ok(())
    }

    /// Numeric registers as name/value pairs, `None` where unset.
    pub fn iter(&self) -> impl Iterator<Item = (RegisterName, Option<i64>)> + '_ {
        RegisterName::ALL
            .into_iter()
            .filter(|name| *name != RegisterName::Ir)
            .map(|name| (name, self.get(name)))
    }
}
