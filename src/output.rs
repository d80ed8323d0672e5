use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::memory::{Cell, Memory};
use crate::register::Registers;
use crate::runtime::{Flow, Observer, Status, View};
use crate::symbol::SymbolTable;

#[macro_export]
macro_rules! dprint {
    ( $cond:expr, $category:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::{Category::*, Condition::*};
        let s = format!(
            $fmt
            $($tt)*
        );
        $crate::output::Output::Debugger($cond, $category).print_str(&s);
    }};
}

#[macro_export]
macro_rules! dprintln {
    ( $cond:expr ) => {{
        #[allow(unused_imports)]
        use $crate::output::{Category::*, Condition::*};
        $crate::output::Output::Debugger($cond, Normal).print_str("\n");
    }};
    ( $cond:expr, $category:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::{Category::*, Condition::*};
        let s = format!(
            concat!($fmt, "\n")
            $($tt)*
        );
        $crate::output::Output::Debugger($cond, $category).print_str(&s);
    }};
}

/// Where text goes. Program output is stdout, everything else is stderr.
#[derive(Clone, Copy, Debug)]
pub enum Output {
    Normal,
    Debugger(Condition, Category),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    /// Printed even with `--minimal`, without color.
    Always,
    /// Dropped with `--minimal`.
    Sometimes,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Category {
    #[default]
    Normal,
    Info,
    Warning,
    Error,
    Special,
}

struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Output {
    thread_local! {
        static IS_LINE_START: RefCell<bool> = const { RefCell::new(true) };
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_line_start(new_value: bool) -> bool {
        Self::IS_LINE_START.with(|value| value.replace(new_value))
    }
    /// Private. Use [`Output::start_new_line`].
    fn is_line_start() -> bool {
        Self::IS_LINE_START.with(|value| *value.borrow())
    }
    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    fn set_line_start_from_str(string: &str) {
        let last = Decolored::new(string).last();
        if let Some(ch) = last {
            Output::set_line_start(ch == '\n');
        }
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => {
                print!("{}", string);
                Self::set_line_start_from_str(string);
            }

            Self::Debugger(condition, category) => match (Self::is_minimal(), *condition) {
                (false, _) => {
                    eprint!("{}", category.paint(string));
                    Self::set_line_start_from_str(string);
                }
                // Always remove color if `--minimal`
                (true, Condition::Always) => {
                    eprint_colorless(string);
                    Self::set_line_start_from_str(string);
                }
                (true, Condition::Sometimes) => (),
            },
        }
    }

    pub fn start_new_line(&self) {
        if !Self::is_line_start() {
            self.print_str("\n");
        }
    }

    pub fn print_registers(&self, registers: &Registers, status: Status) {
        if Self::is_minimal() {
            for (name, value) in registers.iter() {
                match value {
                    Some(value) => self.print_str(&format!("{} {}\n", name, value)),
                    None => self.print_str(&format!("{} -\n", name)),
                }
            }
            self.print_str(&format!("IR {}\n", registers.ir));
            return;
        }

        self.print_str("\x1b[2m┌──────────────────────────────┐\x1b[0m\n");
        for (name, value) in registers.iter() {
            let value = match value {
                Some(value) => format!("{:>20}", value),
                None => format!("{:>20}", "\x1b[2m───\x1b[0m"),
            };
            self.print_str(&format!(
                "\x1b[2m│\x1b[0m \x1b[1m{:<5}\x1b[0m {} \x1b[2m  │\x1b[0m\n",
                name, value
            ));
        }
        self.print_str(&format!(
            "\x1b[2m│\x1b[0m \x1b[1m{:<5}\x1b[0m {:>20} \x1b[2m  │\x1b[0m\n",
            "IR", registers.ir
        ));
        self.print_str(&format!(
            "\x1b[2m│\x1b[0m \x1b[1m{:<5}\x1b[0m {:>20} \x1b[2m  │\x1b[0m\n",
            "STATE",
            format!("{:?}", status)
        ));
        self.print_str("\x1b[2m└──────────────────────────────┘\x1b[0m\n");
    }

    /// One line per non-empty cell, marking the cell at `pc`.
    pub fn print_memory(&self, memory: &Memory, symbols: &SymbolTable, pc: usize) {
        for (address, cell) in memory.iter().enumerate() {
            if *cell == Cell::Empty && address != pc {
                continue;
            }
            if Self::is_minimal() {
                self.print_str(&format!("{} {}\n", address, cell));
                continue;
            }
            let marker = if address == pc { "▶" } else { " " };
            let label = match cell {
                Cell::Label(_) => String::new(),
                _ => symbols
                    .name_of(address)
                    .map(|name| format!("\x1b[2m({name})\x1b[0m"))
                    .unwrap_or_default(),
            };
            self.print_str(&format!(
                "{} \x1b[1m{:>3}\x1b[0m  {} {}\n",
                marker, address, cell, label
            ));
        }
    }

    /// Per-step trace line.
    pub fn print_trace(&self, registers: &Registers, memory: &Memory) {
        let cell = memory
            .get(registers.pc)
            .map(Cell::to_string)
            .unwrap_or_default();
        self.print_str(&format!(
            "{:>3}  {:<12} ACC {}\n",
            registers.pc, cell, registers.acc
        ));
    }
}

/// Terminal stand-in for the display widget: prints every `OUT` value to
/// stdout, optionally traces each step and enforces a step budget.
#[derive(Debug, Default)]
pub struct Console {
    trace: bool,
    max_steps: Option<u64>,
    steps: u64,
    /// Set once the budget forced the machine to finish.
    stopped: bool,
}

impl Console {
    pub fn new(trace: bool, max_steps: Option<u64>) -> Self {
        Console {
            trace,
            max_steps,
            steps: 0,
            stopped: false,
        }
    }

    /// Start a fresh budget, for a machine that was reset.
    pub fn reset(&mut self) {
        self.steps = 0;
        self.stopped = false;
    }

    /// Steps started through [`Observer::between_steps`].
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Whether the step budget ran out.
    pub fn is_exhausted(&self) -> bool {
        self.max_steps.is_some_and(|max| self.steps >= max)
    }

    /// Whether a run was cut short by the budget, as opposed to reaching `FIN`.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Observer for Console {
    fn output(&mut self, view: &View<'_>) {
        if let Some(value) = view.registers.outr {
            Output::Normal.print_str(&format!("{value}\n"));
        }
    }

    fn between_steps(&mut self, view: &View<'_>) -> Flow {
        if self.is_exhausted() {
            self.stopped = true;
            return Flow::Stop;
        }
        self.steps += 1;
        if self.trace {
            Output::Debugger(Condition::Always, Category::Normal)
                .print_trace(view.registers, view.memory);
        }
        Flow::Continue
    }
}

impl Category {
    fn paint(self, string: &str) -> ColoredString {
        let string = ColoredString::from(string);
        match self {
            Category::Normal => string,
            Category::Info => string.cyan(),
            Category::Warning => string.yellow(),
            Category::Error => string.red(),
            Category::Special => string.blue(),
        }
    }
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl<'a> Iterator for Decolored<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

fn eprint_colorless(string: &str) {
    for ch in Decolored::new(string) {
        eprint!("{}", ch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decolored() {
        assert_eq!(Decolored::new("abcdef").collect::<String>(), "abcdef");
        assert_eq!(
            Decolored::new("abc\x1b[0;2mdef\x1b[0m").collect::<String>(),
            "abcdef"
        );
        assert_eq!(Decolored::new("abc\x1b[0xyz").collect::<String>(), "abc");
    }

    #[test]
    fn console_step_budget() {
        let registers = Registers::default();
        let memory = Memory::new(1);
        let symbols = SymbolTable::default();
        let view = View {
            registers: &registers,
            memory: &memory,
            symbols: &symbols,
            status: Status::Running,
        };
        let mut console = Console::new(false, Some(2));
        assert_eq!(console.between_steps(&view), Flow::Continue);
        assert_eq!(console.between_steps(&view), Flow::Continue);
        // Budget used up, but nothing was cut short yet
        assert!(console.is_exhausted());
        assert!(!console.is_stopped());
        assert_eq!(console.between_steps(&view), Flow::Stop);
        assert!(console.is_stopped());
        assert_eq!(console.steps(), 2);

        console.reset();
        assert!(!console.is_stopped());
        assert_eq!(console.steps(), 0);
        assert_eq!(console.between_steps(&view), Flow::Continue);

        let mut console = Console::default();
        for _ in 0..100 {
            assert_eq!(console.between_steps(&view), Flow::Continue);
        }
        assert!(!console.is_exhausted());
    }

    #[test]
    fn minimal_flag_is_thread_local() {
        let previous = Output::set_minimal(true);
        assert!(Output::is_minimal());
        Output::set_minimal(previous);
        assert_eq!(Output::is_minimal(), previous);
    }
}
