use std::{error::Error, fmt};

use crate::register::RegisterName;

#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Step { count: u32 },
    Run,
    Quit,
    Registers,
    Memory,
    Get { location: Location },
    Set { location: Location, value: i64 },
    Input { value: i64 },
    Reset,
}

/// Register or memory location.
#[derive(Debug, PartialEq)]
pub enum Location {
    Register(RegisterName),
    Address(usize),
    /// Resolved against the symbol table when the command runs.
    Label(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommandName {
    Help,
    Step,
    Run,
    Quit,
    Registers,
    Memory,
    Get,
    Set,
    Input,
    Reset,
}

impl CommandName {
    const ALL: [CommandName; 10] = [
        CommandName::Help,
        CommandName::Step,
        CommandName::Run,
        CommandName::Quit,
        CommandName::Registers,
        CommandName::Memory,
        CommandName::Get,
        CommandName::Set,
        CommandName::Input,
        CommandName::Reset,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Step => "step",
            Self::Run => "run",
            Self::Quit => "quit",
            Self::Registers => "registers",
            Self::Memory => "memory",
            Self::Get => "get",
            Self::Set => "set",
            Self::Input => "input",
            Self::Reset => "reset",
        }
    }

    /// Accepts the full name or its first letter, except for `reset`/`run`
    /// and `step`/`set` which need the full name.
    fn parse(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "h" => return Some(Self::Help),
            "q" => return Some(Self::Quit),
            "m" => return Some(Self::Memory),
            "g" => return Some(Self::Get),
            "i" => return Some(Self::Input),
            "r" | "regs" => return Some(Self::Registers),
            "s" => return Some(Self::Step),
            "c" | "continue" => return Some(Self::Run),
            _ => {}
        }
        Self::ALL.into_iter().find(|command| command.as_str() == name)
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a command.
#[derive(Debug, PartialEq)]
pub enum CommandError {
    InvalidCommand {
        command_name: String,
    },
    MissingArgument {
        command_name: CommandName,
        argument_name: &'static str,
    },
    TooManyArguments {
        command_name: CommandName,
        expected_count: u8,
    },
    InvalidValue {
        command_name: CommandName,
        argument_name: &'static str,
        value: String,
    },
}

impl Error for CommandError {}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCommand { command_name } => {
                write!(f, "Not a command: `{}`", command_name)
            }
            Self::MissingArgument {
                command_name,
                argument_name,
            } => write!(
                f,
                "In command `{}`: Missing argument `{}`",
                command_name, argument_name
            ),
            Self::TooManyArguments {
                command_name,
                expected_count,
            } => write!(
                f,
                "In command `{}`: Too many arguments (expected {})",
                command_name, expected_count
            ),
            Self::InvalidValue {
                command_name,
                argument_name,
                value,
            } => write!(
                f,
                "In command `{}`: Invalid value `{}` for argument `{}`",
                command_name, value, argument_name
            ),
        }
    }
}

/// Whitespace-separated arguments of one command.
struct ArgIter<'a> {
    name: CommandName,
    args: std::str::SplitWhitespace<'a>,
}

impl<'a> ArgIter<'a> {
    fn next_integer(&mut self, argument_name: &'static str) -> Result<i64, CommandError> {
        let arg = self.next_required(argument_name)?;
        self.integer(arg, argument_name)
    }

    fn next_integer_or_default(
        &mut self,
        argument_name: &'static str,
        default: u32,
    ) -> Result<u32, CommandError> {
        let Some(arg) = self.args.next() else {
            return Ok(default);
        };
        match arg.parse::<u32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(self.invalid(argument_name, arg)),
        }
    }

    fn next_location(&mut self, argument_name: &'static str) -> Result<Location, CommandError> {
        let arg = self.next_required(argument_name)?;
        if let Ok(register) = arg.parse::<RegisterName>() {
            return Ok(Location::Register(register));
        }
        if arg.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
            return arg
                .parse::<usize>()
                .map(Location::Address)
                .map_err(|_| self.invalid(argument_name, arg));
        }
        Ok(Location::Label(arg.to_string()))
    }

    fn expect_end(&mut self, expected_count: u8) -> Result<(), CommandError> {
        match self.args.next() {
            None => Ok(()),
            Some(_) => Err(CommandError::TooManyArguments {
                command_name: self.name,
                expected_count,
            }),
        }
    }

    fn next_required(&mut self, argument_name: &'static str) -> Result<&'a str, CommandError> {
        self.args.next().ok_or(CommandError::MissingArgument {
            command_name: self.name,
            argument_name,
        })
    }

    fn integer(&self, arg: &str, argument_name: &'static str) -> Result<i64, CommandError> {
        arg.parse().map_err(|_| self.invalid(argument_name, arg))
    }

    fn invalid(&self, argument_name: &'static str, value: &str) -> CommandError {
        CommandError::InvalidValue {
            command_name: self.name,
            argument_name,
            value: value.to_string(),
        }
    }
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    /// Assumes line is non-empty.
    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let mut words = line.split_whitespace();
        let first = words.next().unwrap_or("");
        let name = CommandName::parse(first).ok_or_else(|| CommandError::InvalidCommand {
            command_name: first.to_string(),
        })?;
        let mut iter = ArgIter { name, args: words };

        let (command, expected_count) = match name {
            // Allow trailing arguments
            CommandName::Help => return Ok(Self::Help),

            CommandName::Run => (Self::Run, 0),
            CommandName::Quit => (Self::Quit, 0),
            CommandName::Registers => (Self::Registers, 0),
            CommandName::Memory => (Self::Memory, 0),
            CommandName::Reset => (Self::Reset, 0),

            CommandName::Step => {
                let count = iter.next_integer_or_default("count", 1)?;
                (Self::Step { count }, 1)
            }
            CommandName::Get => {
                let location = iter.next_location("location")?;
                (Self::Get { location }, 1)
            }
            CommandName::Set => {
                let location = iter.next_location("location")?;
                let value = iter.next_integer("value")?;
                (Self::Set { location, value }, 2)
            }
            CommandName::Input => {
                let value = iter.next_integer("value")?;
                (Self::Input { value }, 1)
            }
        };

        iter.expect_end(expected_count)?;
        Ok(command)
    }
}
