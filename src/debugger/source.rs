use std::io::{self, BufRead, IsTerminal};

use crate::dprintln;

/// Where debugger commands come from.
#[derive(Debug)]
pub enum Source {
    Argument(Argument),
    Stdin(Stdin),
    Terminal(Terminal),
}

// Command-line argument
#[derive(Debug)]
pub struct Argument {
    buffer: String,
    /// Byte index
    cursor: usize,
}

// Stdin which is not attached to a terminal, i.e. piped.
#[derive(Debug)]
pub struct Stdin {
    stdin: io::Stdin,
    buffer: String,
}

// Interactive terminal
#[derive(Debug)]
pub struct Terminal {
    term: console::Term,
    buffer: String,
}

pub trait SourceRead {
    /// `None` indicates EOF
    /// Returned string slice MAY include leading or trailing whitespace
    fn read(&mut self) -> Option<&str>;
}

impl Source {
    pub fn from(argument: Option<String>) -> Self {
        if let Some(argument) = argument {
            return Source::Argument(Argument::from(argument));
        }
        let stdin = io::stdin();
        if stdin.is_terminal() {
            return Source::Terminal(Terminal::new());
        }
        Source::Stdin(Stdin {
            stdin,
            buffer: String::new(),
        })
    }
}

impl SourceRead for Source {
    fn read(&mut self) -> Option<&str> {
        let command = match self {
            Self::Argument(argument) => argument.read(),
            Self::Stdin(stdin) => stdin.read(),
            Self::Terminal(terminal) => return terminal.read(),
        };
        // Echo prompt and command for non-terminal source
        if let Some(command) = command {
            dprintln!(Always, Special, "> {}", command.trim());
        }
        command
    }
}

impl Argument {
    pub fn from(source: String) -> Self {
        Self {
            buffer: source,
            cursor: 0,
        }
    }
}

impl SourceRead for Argument {
    fn read(&mut self) -> Option<&str> {
        // EOF
        if self.cursor >= self.buffer.len() {
            return None;
        }

        // Take characters until delimiter
        let start = self.cursor;
        let mut chars = self.buffer[self.cursor..].chars();
        while let Some(ch) = chars.next().filter(|ch| *ch != '\n' && *ch != ';') {
            self.cursor += ch.len_utf8();
        }

        let end = self.cursor;
        self.cursor += 1; // sizeof('\n' or ';')

        self.buffer.get(start..end)
    }
}

impl SourceRead for Stdin {
    fn read(&mut self) -> Option<&str> {
        self.buffer.clear();
        match self.stdin.lock().read_line(&mut self.buffer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(self.buffer.as_str()),
        }
    }
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            term: console::Term::stderr(),
            buffer: String::new(),
        }
    }
}

impl SourceRead for Terminal {
    fn read(&mut self) -> Option<&str> {
        crate::output::Output::Debugger(crate::output::Condition::Always, Default::default())
            .start_new_line();
        print_prompt(&self.term).ok()?;
        self.buffer = self.term.read_line().ok()?;
        Some(self.buffer.as_str())
    }
}

fn print_prompt(term: &console::Term) -> io::Result<()> {
    use colored::Colorize as _;
    term.write_str(&format!("{} ", "(vonsim)".bold()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_splits_on_delimiters() {
        let mut source = Argument::from("step 2;registers\nquit".to_string());
        assert_eq!(source.read(), Some("step 2"));
        assert_eq!(source.read(), Some("registers"));
        assert_eq!(source.read(), Some("quit"));
        assert_eq!(source.read(), None);
    }

    #[test]
    fn prompt_reports_write_result() {
        assert!(print_prompt(&console::Term::stderr()).is_ok());
    }

    #[test]
    fn argument_keeps_empty_commands() {
        let mut source = Argument::from("run;;".to_string());
        assert_eq!(source.read(), Some("run"));
        assert_eq!(source.read(), Some(""));
        assert_eq!(source.read(), None);
    }
}
