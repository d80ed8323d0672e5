use std::{cell::RefCell, ffi::OsStr};

use crate::memory::MEMORY_CELLS;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Env {
    trace: bool,
    memory_cells: usize,
}

impl Default for Env {
    fn default() -> Self {
        Env {
            trace: false,
            memory_cells: MEMORY_CELLS,
        }
    }
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read configuration from the process environment.
///
/// - `VONSIM_TRACE=1` prints every step.
/// - `VONSIM_CELLS=<n>` changes the memory size.
pub fn init() {
    let value = Env {
        trace: var_is("VONSIM_TRACE", "1"),
        memory_cells: var_parse("VONSIM_CELLS").unwrap_or(MEMORY_CELLS),
    };
    set_env(value);
}

pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace)
}

pub fn memory_cells() -> usize {
    with_env(|env| env.memory_cells)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}

fn var_parse(name: impl AsRef<OsStr>) -> Option<usize> {
    std::env::var(name.as_ref())
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .filter(|cells| *cells > 0)
}
