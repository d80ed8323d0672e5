use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, IntoDiagnostic, Result};

use vonsim::{Console, Debugger, DebuggerOptions, Machine, Output, Program, Status};

/// Simulator and debugger for a small accumulator machine with shared code and data memory.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a program file to run
    path: Option<PathBuf>,

    #[command(flatten)]
    machine: MachineArgs,
}

/// Options shared by every command that loads a machine.
#[derive(clap::Args, Clone, Debug, Default)]
struct MachineArgs {
    /// Initial value of the input register
    #[arg(short, long, global = true, allow_hyphen_values = true)]
    input: Option<i64>,
    /// Initial value of the accumulator
    #[arg(short, long, global = true, allow_hyphen_values = true)]
    acc: Option<i64>,
    /// Force the machine to finish after this many steps
    #[arg(short = 't', long, global = true)]
    max_steps: Option<u64>,
    /// Print every step to stderr
    #[arg(long, global = true)]
    trace: bool,
    /// Produce minimal output, suited for blackbox tests
    #[arg(short, long, global = true)]
    minimal: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program to completion and print every `OUT` value
    Run {
        /// Program file to run
        name: PathBuf,
    },
    /// Step through a program with the debugger
    Debug {
        /// Program file to debug
        name: PathBuf,
        /// Read debugger commands from argument
        #[arg(short, long)]
        command: Option<String>,
    },
    /// Check a program for load errors without running it
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Place a watch on a program file to re-check it on every change
    Watch {
        /// File to watch
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    vonsim::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(vonsim::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    Output::set_minimal(args.machine.minimal);
    let opts = args.machine;

    let Some(command) = args.command else {
        if let Some(path) = args.path {
            return run(&path, &opts);
        }
        println!("\n~ vonsim v{VERSION} ~");
        println!("{SHORT_INFO}");
        std::process::exit(0);
    };

    match command {
        Command::Run { name } => run(&name, &opts),
        Command::Debug { name, command } => debug(&name, command, &opts),
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let src = fs::read_to_string(&name).into_diagnostic()?;
            let machine = load(&src)?;
            message(
                Green,
                "Success",
                &format!(
                    "no errors found, {} labels in {} cells",
                    machine.symbols().len(),
                    machine.memory().len()
                ),
            );
            Ok(())
        }
        Command::Watch { name } => watch(name),
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    if Output::is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    eprintln!("{left:>12} {right}");
}

/// Load program text into a fresh machine sized by the environment.
fn load(src: &str) -> Result<Machine> {
    let program = Program::from_source(src);
    Machine::with_capacity(&program, vonsim::env::memory_cells())
        .map_err(|error| error.report(&program.source()))
}

fn prepare(name: &Path, opts: &MachineArgs) -> Result<(String, Machine)> {
    file_message(MsgColor::Green, "Loading", name);
    let src = fs::read_to_string(name).into_diagnostic()?;
    let mut machine = load(&src)?;
    if let Some(input) = opts.input {
        machine.set_input(input);
    }
    if let Some(acc) = opts.acc {
        machine.registers_mut().acc = acc;
    }
    Ok((Program::from_source(&src).source(), machine))
}

fn run(name: &Path, opts: &MachineArgs) -> Result<()> {
    let (src, mut machine) = prepare(name, opts)?;
    let mut console = Console::new(
        opts.trace || vonsim::env::is_trace_enabled(),
        opts.max_steps,
    );

    message(MsgColor::Green, "Running", "loaded program");
    match machine.run(&mut console) {
        Ok(Status::Finished) if console.is_stopped() => {
            message(
                MsgColor::Red,
                "Stopped",
                &format!("step limit of {} reached", console.steps()),
            );
        }
        Ok(_) => {}
        Err(error) => {
            message(MsgColor::Red, "Faulted", &format!("after {} steps", console.steps()));
            return Err(error.report(&src));
        }
    }

    file_message(MsgColor::Green, "Finished", name);
    Ok(())
}

fn debug(name: &Path, command: Option<String>, opts: &MachineArgs) -> Result<()> {
    let (_, machine) = prepare(name, opts)?;
    let debugger_opts = DebuggerOptions {
        command,
        trace: opts.trace || vonsim::env::is_trace_enabled(),
        max_steps: opts.max_steps,
    };

    let status = Debugger::new(debugger_opts, machine).run();
    let status = match status {
        Status::Running => "paused",
        Status::Finished => "finished",
        Status::Faulted => "faulted",
    };
    message(MsgColor::Green, "Completed", &format!("debugging, program {status}"));
    Ok(())
}

fn watch(name: PathBuf) -> Result<()> {
    use MsgColor::*;
    if !name.exists() {
        bail!("File does not exist. Exiting...")
    }
    // Vim breaks if watching a single file
    let folder_path = match name.parent() {
        Some(pth) if pth.is_dir() => pth.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    // Clear screen and move cursor to top left
    print!("\x1B[2J\x1B[2;1H");
    file_message(Green, "Watching", &name);
    message(Cyan, "Help", "press CTRL+C to exit");

    let mut watcher =
        Hotwatch::new_with_custom_delay(Duration::from_millis(500)).into_diagnostic()?;

    watcher
        .watch(folder_path, move |event: Event| match event.kind {
            // Watch remove for vim changes
            EventKind::Modify(_) | EventKind::Remove(_) => {
                // Clear screen
                print!("\x1B[2J\x1B[2;1H");
                file_message(Green, "Watching", &name);
                message(Green, "Re-checking", "file change detected");
                message(Cyan, "Help", "press CTRL+C to exit");

                sleep(Duration::from_millis(50));

                let src = match fs::read_to_string(&name) {
                    Ok(src) => src,
                    Err(e) => {
                        eprintln!("{e}. Exiting...");
                        std::process::exit(1)
                    }
                };
                match load(&src) {
                    Ok(_) => message(Green, "Success", "no errors found!"),
                    Err(e) => println!("\n{:?}", e),
                }
                Flow::Continue
            }
            _ => Flow::Continue,
        })
        .into_diagnostic()?;
    watcher.run();
    Ok(())
}

const SHORT_INFO: &str = r"
Welcome to vonsim, a simulator for a small accumulator machine
whose single memory holds both instructions and data.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
