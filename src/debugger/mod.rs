mod command;
mod source;

use self::command::{Command, Location};
use self::source::{Source, SourceRead};
use crate::output::{Category, Condition, Console, Output};
use crate::register::{RegisterName, SetError};
use crate::runtime::{Machine, Status, StepOutcome};
use crate::{dprint, dprintln};

/// Leave this as a struct, in case more options are added in the future. Plus it is more explicit.
#[derive(Debug, Default)]
pub struct DebuggerOptions {
    pub command: Option<String>,
    pub trace: bool,
    pub max_steps: Option<u64>,
}

/// Interactive controller for one machine.
pub struct Debugger {
    machine: Machine,
    console: Console,
    command_source: Source,

    /// Amount of cells stepped through since last command.
    instruction_count: u64,
    /// Whether PC should be displayed on next command prompt.
    should_echo_pc: bool,
}

impl Debugger {
    pub fn new(opts: DebuggerOptions, machine: Machine) -> Self {
        Self {
            machine,
            console: Console::new(opts.trace, opts.max_steps),
            command_source: Source::from(opts.command),
            instruction_count: 0,
            should_echo_pc: true,
        }
    }

    /// Process commands until `quit` or end of input.
    pub fn run(&mut self) -> Status {
        while let Some(command) = self.next_command() {
            if command == Command::Quit {
                break;
            }
            self.execute(command);
            self.report_progress();
        }
        self.machine.status()
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    fn report_progress(&mut self) {
        if self.instruction_count > 0 {
            dprintln!(
                Always,
                Info,
                "Executed {} cell{}.",
                self.instruction_count,
                if self.instruction_count == 1 { "" } else { "s" },
            );
            self.instruction_count = 0;
        }
        if self.should_echo_pc {
            dprintln!(
                Sometimes,
                Info,
                "Program counter at: {}.",
                self.machine.registers().pc
            );
            self.should_echo_pc = false;
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            // Handled by caller
            Command::Quit => {}

            Command::Help => {
                dprintln!(Always, Special, "{}", help_text());
            }

            Command::Step { count } => {
                for _ in 0..count {
                    if !self.step() {
                        break;
                    }
                }
                self.should_echo_pc = true;
            }

            Command::Run => {
                if self.machine.status() == Status::Running {
                    dprintln!(Sometimes, Info, "Running...");
                }
                let before = self.console.steps();
                let result = self.machine.run(&mut self.console);
                self.instruction_count += self.console.steps() - before;
                match result {
                    Ok(_) if self.console.is_stopped() => {
                        dprintln!(Always, Warning, "Step limit reached. Program was stopped.");
                    }
                    Ok(_) => {
                        dprintln!(Always, Warning, "Reached FIN.");
                    }
                    Err(error) => {
                        dprintln!(Always, Error, "{}", error);
                    }
                }
                self.should_echo_pc = true;
            }

            Command::Registers => {
                dprintln!(Sometimes, Info, "Registers:");
                Output::Debugger(Condition::Always, Category::Normal)
                    .print_registers(self.machine.registers(), self.machine.status());
            }

            Command::Memory => {
                dprintln!(Sometimes, Info, "Memory:");
                Output::Debugger(Condition::Always, Category::Normal).print_memory(
                    self.machine.memory(),
                    self.machine.symbols(),
                    self.machine.registers().pc,
                );
            }

            Command::Get { location } => match location {
                Location::Register(RegisterName::Ir) => {
                    dprintln!(Always, Normal, "{}", self.machine.registers().ir);
                }
                Location::Register(register) => {
                    match self.machine.registers().get(register) {
                        Some(value) => dprintln!(Always, Normal, "{}", value),
                        None => dprintln!(Always, Normal, "-"),
                    }
                }
                location => {
                    let Some(address) = self.resolve_address(&location) else {
                        return;
                    };
                    dprintln!(Sometimes, Info, "Memory at address {}:", address);
                    let cell = self
                        .machine
                        .memory()
                        .get(address)
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    dprintln!(Always, Normal, "{}", cell);
                }
            },

            Command::Set { location, value } => match location {
                Location::Register(register) => {
                    match self.machine.registers_mut().set(register, value) {
                        Ok(()) => dprintln!(Always, Warning, "Updated register {}.", register),
                        Err(SetError::ReadOnly) => {
                            dprintln!(Always, Error, "Register {} cannot be set.", register)
                        }
                        Err(SetError::Negative) => {
                            dprintln!(Always, Error, "Register {} cannot be negative.", register)
                        }
                    }
                    if register == RegisterName::Pc {
                        self.should_echo_pc = true;
                    }
                }
                location => {
                    let Some(address) = self.resolve_address(&location) else {
                        return;
                    };
                    self.machine.poke(address, value);
                    dprintln!(Always, Warning, "Updated memory at address {}.", address);
                }
            },

            Command::Input { value } => {
                self.machine.set_input(value);
                dprintln!(Always, Warning, "Set input register to {}.", value);
            }

            Command::Reset => {
                self.machine.reset();
                self.console.reset();
                self.should_echo_pc = true;
                dprintln!(Always, Warning, "Reset program to initial state.");
            }
        }
    }

    /// Execute one cell. Returns whether stepping can continue.
    fn step(&mut self) -> bool {
        match self.machine.step(&mut self.console) {
            Ok(StepOutcome::Finished) => {
                dprintln!(Always, Error, "Program has already finished.");
                false
            }
            Ok(StepOutcome::Executed(opcode)) => {
                self.instruction_count += 1;
                if self.machine.status() == Status::Finished {
                    dprintln!(Always, Warning, "Reached {}.", opcode);
                    return false;
                }
                true
            }
            Ok(StepOutcome::Skipped(_)) => {
                self.instruction_count += 1;
                true
            }
            Err(error) => {
                dprintln!(Always, Error, "{}", error);
                false
            }
        }
    }

    fn resolve_address(&self, location: &Location) -> Option<usize> {
        let address = match location {
            Location::Register(_) => return None,
            Location::Address(address) => *address,
            Location::Label(name) => match self.machine.symbols().get(name) {
                Some(address) => address,
                None => {
                    dprintln!(Always, Error, "Label not found named `{}`.", name);
                    return None;
                }
            },
        };
        if address >= self.machine.memory().len() {
            dprintln!(
                Always,
                Error,
                "Address {} is outside memory. Must be less than {}.",
                address,
                self.machine.memory().len()
            );
            return None;
        }
        Some(address)
    }

    /// Returns `None` on EOF.
    fn next_command(&mut self) -> Option<Command> {
        // Loop until valid command or EOF
        loop {
            let line = self.command_source.read()?.trim();
            // Necessary, since `Command::try_from` assumes non-empty line
            if line.is_empty() {
                continue;
            }

            match Command::try_from(line) {
                Ok(command) => return Some(command),
                Err(error) => {
                    dprintln!(Always, Error, "{}", error);
                    dprint!(Always, Error, "Type `help` for a list of commands.\n");
                }
            }
        }
    }
}

/// Expand `{...}` markup in the help text into escape sequences.
fn help_text() -> String {
    let raw = include_str!("./help.txt");
    let mut text = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '{' {
            text.push(ch);
            continue;
        }
        text.push('\x1b');
        for ch in chars.by_ref() {
            if ch == '}' {
                break;
            }
            text.push(ch);
        }
    }
    text
}
