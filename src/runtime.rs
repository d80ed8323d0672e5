use crate::decode::{Instruction, Opcode};
use crate::error::{LoadError, RuntimeError};
use crate::memory::{Cell, CellKind, Memory, MEMORY_CELLS};
use crate::program::Program;
use crate::register::Registers;
use crate::symbol::SymbolTable;

/// Execution state of the machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    Running,
    /// Entered by `FIN` or a forced finish. Steps are no-ops.
    Finished,
    /// A step raised a fatal error. Steps fail until the machine is reloaded.
    Faulted,
}

/// What a single step did.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepOutcome {
    Executed(Opcode),
    /// Label, comment or data cell passed over.
    Skipped(CellKind),
    /// Machine was already finished; nothing happened.
    Finished,
}

/// Whether `run` should keep going.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flow {
    Continue,
    Stop,
}

/// Read-only view handed to observers.
#[derive(Clone, Copy, Debug)]
pub struct View<'a> {
    pub registers: &'a Registers,
    pub memory: &'a Memory,
    pub symbols: &'a SymbolTable,
    pub status: Status,
}

/// Controller-side hooks. Only ever given read access.
pub trait Observer {
    /// Called once after every `OUT`, after its effect is committed.
    fn output(&mut self, view: &View<'_>);

    /// Called by [`Machine::run`] before each step. Returning [`Flow::Stop`]
    /// finishes the machine.
    fn between_steps(&mut self, _view: &View<'_>) -> Flow {
        Flow::Continue
    }
}

impl Observer for () {
    fn output(&mut self, _view: &View<'_>) {}
}

impl<F> Observer for F
where
    F: FnMut(&View<'_>),
{
    fn output(&mut self, view: &View<'_>) {
        self(view)
    }
}

/// Where the program counter goes after a handler.
enum Next {
    Advance,
    Jump(usize),
    Halt,
}

/// Complete machine state: memory, registers and symbol table of one loaded
/// program.
#[derive(Clone, Debug)]
pub struct Machine {
    memory: Memory,
    registers: Registers,
    symbols: SymbolTable,
    status: Status,
    /// Memory as loaded. Must not be mutated.
    initial_memory: Memory,
}

impl Machine {
    /// Load into a memory of the reference size.
    pub fn load(program: &Program) -> Result<Self, LoadError> {
        Self::with_capacity(program, MEMORY_CELLS)
    }

    pub fn with_capacity(program: &Program, capacity: usize) -> Result<Self, LoadError> {
        let (memory, symbols) = program.load(capacity)?;
        Ok(Machine {
            initial_memory: memory.clone(),
            memory,
            registers: Registers::default(),
            symbols,
            status: Status::Running,
        })
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Direct register access for the controller, between steps.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn view(&self) -> View<'_> {
        View {
            registers: &self.registers,
            memory: &self.memory,
            symbols: &self.symbols,
            status: self.status,
        }
    }

    /// Latest value for `INPR`. Only the most recent value is visible.
    pub fn set_input(&mut self, value: i64) {
        self.registers.inpr = Some(value);
    }

    /// Overwrite a memory cell with a number, as an on-screen editor would.
    pub fn poke(&mut self, address: usize, value: i64) -> bool {
        self.memory.set(address, Cell::Literal(value))
    }

    /// Force the terminal state. Has no effect on a faulted machine.
    pub fn finish(&mut self) {
        if self.status == Status::Running {
            self.status = Status::Finished;
        }
    }

    /// Back to the freshly loaded state. The input register is kept.
    pub fn reset(&mut self) {
        self.memory = self.initial_memory.clone();
        self.registers = Registers {
            inpr: self.registers.inpr,
            ..Registers::default()
        };
        self.status = Status::Running;
    }

    /// Step until the machine finishes, faults, or the observer stops it.
    ///
    /// A program that never reaches `FIN` runs forever unless the observer
    /// intervenes.
    pub fn run(&mut self, observer: &mut impl Observer) -> Result<Status, RuntimeError> {
        loop {
            if self.status == Status::Running
                && observer.between_steps(&self.view()) == Flow::Stop
            {
                self.finish();
            }
            match self.status {
                Status::Running => {
                    self.step(observer)?;
                }
                Status::Finished => return Ok(Status::Finished),
                Status::Faulted => return Err(RuntimeError::Faulted),
            }
        }
    }

    /// One fetch-decode-execute cycle.
    pub fn step(&mut self, observer: &mut impl Observer) -> Result<StepOutcome, RuntimeError> {
        match self.status {
            Status::Running => {}
            Status::Finished => return Ok(StepOutcome::Finished),
            Status::Faulted => return Err(RuntimeError::Faulted),
        }
        let result = self.cycle(observer);
        if result.is_err() {
            self.status = Status::Faulted;
        }
        result
    }

    fn cycle(&mut self, observer: &mut impl Observer) -> Result<StepOutcome, RuntimeError> {
        let pc = self.registers.pc;
        let cell = self
            .memory
            .get(pc)
            .ok_or(RuntimeError::PcOutOfBounds { pc })?;
        self.registers.ir = cell.to_string();

        let (opcode, operand) = match cell {
            Cell::Instruction(Instruction { opcode, operand }) => {
                (*opcode, operand.as_ref().map(|operand| operand.value()))
            }
            Cell::Label(_) | Cell::Comment(_) | Cell::Literal(_) => {
                let kind = cell.kind();
                self.registers.pc += 1;
                return Ok(StepOutcome::Skipped(kind));
            }
            Cell::Empty => return Err(RuntimeError::EmptyCell { address: pc }),
            Cell::Malformed { error, .. } => {
                return Err(RuntimeError::Decode {
                    address: pc,
                    line: self.registers.ir.clone(),
                    error: error.clone(),
                })
            }
        };

        if let Some(value) = operand {
            self.registers.ar = value;
        }

        match self.execute(opcode)? {
            Next::Advance => self.registers.pc += 1,
            Next::Jump(target) => self.registers.pc = target,
            Next::Halt => self.status = Status::Finished,
        }

        if opcode == Opcode::Out {
            observer.output(&self.view());
        }
        Ok(StepOutcome::Executed(opcode))
    }

    fn execute(&mut self, opcode: Opcode) -> Result<Next, RuntimeError> {
        match opcode {
            Opcode::Lom => {
                let value = self.read_operand()?;
                self.registers.dr = value;
                self.registers.acc = value;
            }
            Opcode::Sto => {
                let target = self.operand_address()?;
                let value = self.registers.acc;
                self.memory.set(target, Cell::Literal(value));
            }
            Opcode::Add => {
                let value = self.read_operand()?;
                self.registers.acc = self.checked(self.registers.acc.checked_add(value))?;
            }
            Opcode::Sub => {
                let value = self.read_operand()?;
                self.registers.acc = self.checked(self.registers.acc.checked_sub(value))?;
            }
            Opcode::Mul => self.multiply()?,
            Opcode::And => {
                let value = self.read_operand()?;
                self.registers.acc &= value;
            }
            Opcode::Or => {
                let value = self.read_operand()?;
                self.registers.acc |= value;
            }
            Opcode::Xor => {
                let value = self.read_operand()?;
                self.registers.acc ^= value;
            }
            Opcode::Not => self.registers.acc = !self.registers.acc,
            Opcode::Inr => {
                self.registers.acc = self.checked(self.registers.acc.checked_add(1))?;
            }
            Opcode::Inp => {
                let input = self.registers.inpr.ok_or_else(|| RuntimeError::NoInput {
                    address: self.registers.pc,
                    line: self.registers.ir.clone(),
                })?;
                self.registers.acc = input;
            }
            Opcode::Out => self.registers.outr = Some(self.registers.acc),
            Opcode::Jum => return Ok(Next::Jump(self.jump_target()?)),
            Opcode::Juz => {
                if self.registers.acc == 0 {
                    return Ok(Next::Jump(self.jump_target()?));
                }
            }
            Opcode::Fin => return Ok(Next::Halt),
        }
        Ok(Next::Advance)
    }

    /// Repeated addition of the staged `DR`, as the hardware does it.
    ///
    /// `CTR` counts up from `1 - M[AR]` to zero, adding `DR` to `ACC` each
    /// time. `ACC` is not cleared first.
    fn multiply(&mut self) -> Result<(), RuntimeError> {
        let multiplier = self.read_operand()?;
        let start = multiplier.checked_neg().and_then(|neg| neg.checked_add(1));
        let start = match start {
            Some(start) if start <= 0 => start,
            _ => {
                return Err(RuntimeError::InvalidMultiplier {
                    address: self.registers.pc,
                    value: multiplier,
                    line: self.registers.ir.clone(),
                })
            }
        };

        self.registers.ctr = start;
        while self.registers.ctr != 0 {
            let sum = self.registers.acc.checked_add(self.registers.dr);
            self.registers.acc = self.checked(sum)?;
            self.registers.ctr += 1;
        }
        Ok(())
    }

    /// `AR` as a memory index.
    fn operand_address(&self) -> Result<usize, RuntimeError> {
        self.memory
            .index(self.registers.ar)
            .ok_or_else(|| RuntimeError::InvalidAddress {
                address: self.registers.pc,
                target: self.registers.ar,
                line: self.registers.ir.clone(),
            })
    }

    /// `M[AR]`
    fn read_operand(&self) -> Result<i64, RuntimeError> {
        let target = self.operand_address()?;
        self.memory
            .get(target)
            .and_then(Cell::number)
            .ok_or_else(|| RuntimeError::NotANumber {
                address: self.registers.pc,
                target,
                line: self.registers.ir.clone(),
            })
    }

    fn jump_target(&self) -> Result<usize, RuntimeError> {
        self.operand_address()
    }

    fn checked(&self, value: Option<i64>) -> Result<i64, RuntimeError> {
        value.ok_or_else(|| RuntimeError::Overflow {
            address: self.registers.pc,
            line: self.registers.ir.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(lines: &[&str]) -> Machine {
        Machine::load(&Program::from_lines(lines.iter().copied())).unwrap()
    }

    fn run(machine: &mut Machine) -> Result<Status, RuntimeError> {
        machine.run(&mut ())
    }

    #[test]
    fn load_then_output() {
        let mut m = machine(&["LOM 3", "OUT", "FIN", "7"]);
        assert_eq!(run(&mut m), Ok(Status::Finished));
        assert_eq!(m.registers().outr, Some(7));
        assert_eq!(m.registers().acc, 7);
        assert_eq!(m.registers().dr, 7);
        // FIN leaves PC on itself
        assert_eq!(m.registers().pc, 2);
        assert_eq!(m.registers().ir, "FIN");
    }

    #[test]
    fn label_loop_counts_up_to_zero() {
        let mut m = machine(&["loop:", "INR", "JUZ end", "JUM loop", "end:", "OUT", "FIN"]);
        m.registers_mut().acc = -3;
        let mut increments = 0;
        let mut outputs = Vec::new();
        loop {
            let mut observer = |view: &View<'_>| outputs.push(view.registers.outr);
            match m.step(&mut observer).unwrap() {
                StepOutcome::Executed(Opcode::Inr) => increments += 1,
                StepOutcome::Finished => break,
                _ => {}
            }
        }
        assert_eq!(increments, 3);
        assert_eq!(outputs, [Some(0)]);
        assert_eq!(m.status(), Status::Finished);
    }

    #[test]
    fn store_then_load() {
        let mut m = machine(&["LOM 6", "STO 7", "LOM 8", "LOM 7", "FIN", "", "-11", "", "3"]);
        assert_eq!(run(&mut m), Ok(Status::Finished));
        assert_eq!(m.registers().acc, -11);
        assert_eq!(m.memory().get(7), Some(&Cell::Literal(-11)));
        assert_eq!(m.memory().lines().nth(7).unwrap(), "-11");
    }

    #[test]
    fn store_overwrites_code() {
        let mut m = machine(&["LOM 3", "STO 2", "INR", "5"]);
        m.step(&mut ()).unwrap();
        m.step(&mut ()).unwrap();
        // The INR cell now holds data and is passed over
        assert_eq!(
            m.step(&mut ()),
            Ok(StepOutcome::Skipped(CellKind::Literal))
        );
        assert_eq!(m.registers().acc, 5);
    }

    #[test]
    fn branch_taken_only_on_zero() {
        let mut m = machine(&["JUZ 3", "FIN", "FIN", "FIN"]);
        m.step(&mut ()).unwrap();
        assert_eq!(m.registers().pc, 3);
        assert_eq!(m.registers().ar, 3);

        let mut m = machine(&["JUZ 3", "FIN", "FIN", "FIN"]);
        m.registers_mut().acc = 4;
        m.step(&mut ()).unwrap();
        assert_eq!(m.registers().pc, 1);

        let mut m = machine(&["JUZ 3", "FIN", "FIN", "FIN"]);
        m.registers_mut().acc = -1;
        m.step(&mut ()).unwrap();
        assert_eq!(m.registers().pc, 1);
    }

    #[test]
    fn jump_out_of_memory_faults_without_moving_pc() {
        let mut m = machine(&["INR", "JUM 32"]);
        m.step(&mut ()).unwrap();
        assert_eq!(
            m.step(&mut ()),
            Err(RuntimeError::InvalidAddress {
                address: 1,
                target: 32,
                line: "JUM 32".into(),
            })
        );
        assert_eq!(m.registers().pc, 1);
        assert_eq!(m.status(), Status::Faulted);
        assert_eq!(m.step(&mut ()), Err(RuntimeError::Faulted));
        assert_eq!(m.registers().pc, 1);
    }

    #[test]
    fn negative_jump_faults() {
        let mut m = machine(&["JUM -1"]);
        assert!(matches!(
            m.step(&mut ()),
            Err(RuntimeError::InvalidAddress { target: -1, .. })
        ));
        assert_eq!(m.registers().pc, 0);
    }

    #[test]
    fn bitwise_matches_host() {
        let values: [i64; 6] = [0, 1, -1, 6, -6, 0x5a5a];
        for &a in &values {
            for &b in &values {
                let b_text = b.to_string();
                let cases = [("AND", a & b), ("OR", a | b), ("XOR", a ^ b)];
                for (mnemonic, expected) in cases {
                    let op = format!("{mnemonic} 4");
                    let mut m = machine(&["LOM 3", op.as_str(), "FIN", "0", b_text.as_str()]);
                    m.poke(3, a);
                    assert_eq!(run(&mut m), Ok(Status::Finished));
                    assert_eq!(m.registers().acc, expected, "{a} {mnemonic} {b}");
                }
            }
            let mut m = machine(&["NOT", "FIN"]);
            m.registers_mut().acc = a;
            run(&mut m).unwrap();
            assert_eq!(m.registers().acc, !a);
        }
    }

    #[test]
    fn arithmetic() {
        let mut m = machine(&["LOM 5", "ADD 6", "SUB 7", "INR", "FIN", "10", "4", "20"]);
        run(&mut m).unwrap();
        assert_eq!(m.registers().acc, -5);
    }

    #[test]
    fn multiply_uses_staged_data_register() {
        // ACC = DR = 6, then 6 + 6 * (4 - 1)
        let mut m = machine(&["LOM 3", "MUL 4", "FIN", "6", "4"]);
        run(&mut m).unwrap();
        assert_eq!(m.registers().acc, 24);
        assert_eq!(m.registers().ctr, 0);
        assert_eq!(m.registers().ar, 4);

        // ACC going in contributes, DR is not reloaded from M[AR]
        let mut m = machine(&["LOM 3", "ADD 4", "MUL 4", "FIN", "6", "4"]);
        run(&mut m).unwrap();
        assert_eq!(m.registers().acc, 10 + 6 * 3);

        // Multiplier of one leaves ACC untouched
        let mut m = machine(&["LOM 3", "MUL 4", "FIN", "6", "1"]);
        run(&mut m).unwrap();
        assert_eq!(m.registers().acc, 6);
    }

    #[test]
    fn multiply_rejects_non_positive() {
        let mut m = machine(&["LOM 3", "MUL 4", "FIN", "6", "0"]);
        assert!(matches!(
            run(&mut m),
            Err(RuntimeError::InvalidMultiplier { value: 0, .. })
        ));
        assert_eq!(m.registers().acc, 6);
    }

    #[test]
    fn input_register() {
        let mut m = machine(&["INP", "OUT", "FIN"]);
        m.set_input(12);
        run(&mut m).unwrap();
        assert_eq!(m.registers().outr, Some(12));

        let mut m = machine(&["INP", "FIN"]);
        assert_eq!(
            run(&mut m),
            Err(RuntimeError::NoInput {
                address: 0,
                line: "INP".into()
            })
        );
    }

    #[test]
    fn optional_operands_load_address_register() {
        let mut m = machine(&["LOM 3", "OUT 0 display", "FIN", "7"]);
        run(&mut m).unwrap();
        assert_eq!(m.registers().outr, Some(7));
        assert_eq!(m.registers().ar, 0);

        let mut m = machine(&["INR 5", "FIN"]);
        run(&mut m).unwrap();
        assert_eq!(m.registers().acc, 1);
        assert_eq!(m.registers().ar, 5);
        assert_eq!(m.memory().get(0).map(Cell::to_string), Some("INR 5".into()));

        let mut m = machine(&["INR x", "FIN"]);
        assert!(matches!(
            run(&mut m),
            Err(RuntimeError::Decode { address: 0, .. })
        ));
    }

    #[test]
    fn skips_labels_comments_and_data() {
        let mut m = machine(&["# start", "here:", "5", "FIN"]);
        assert_eq!(m.step(&mut ()), Ok(StepOutcome::Skipped(CellKind::Comment)));
        assert_eq!(m.registers().ir, "# start");
        assert_eq!(m.step(&mut ()), Ok(StepOutcome::Skipped(CellKind::Label)));
        assert_eq!(m.step(&mut ()), Ok(StepOutcome::Skipped(CellKind::Literal)));
        assert_eq!(m.step(&mut ()), Ok(StepOutcome::Executed(Opcode::Fin)));
        assert_eq!(m.step(&mut ()), Ok(StepOutcome::Finished));
        assert_eq!(m.registers().pc, 3);
    }

    #[test]
    fn fetch_errors() {
        let mut m = machine(&["INR"]);
        m.step(&mut ()).unwrap();
        assert_eq!(
            m.step(&mut ()),
            Err(RuntimeError::EmptyCell { address: 1 })
        );

        let mut m = machine(&["NOP 1"]);
        assert!(matches!(
            run(&mut m),
            Err(RuntimeError::Decode { address: 0, .. })
        ));

        let mut m = machine(&["LOM 1", "FIN"]);
        assert!(matches!(
            run(&mut m),
            Err(RuntimeError::NotANumber { target: 1, .. })
        ));

        let program = Program::from_lines(["INR", "JUM 0"]);
        let mut m = Machine::with_capacity(&program, 2).unwrap();
        m.registers_mut().pc = 2;
        assert_eq!(m.step(&mut ()), Err(RuntimeError::PcOutOfBounds { pc: 2 }));
    }

    #[test]
    fn overflow_faults() {
        let mut m = machine(&["INR", "FIN"]);
        m.registers_mut().acc = i64::MAX;
        assert!(matches!(
            run(&mut m),
            Err(RuntimeError::Overflow { address: 0, .. })
        ));
    }

    #[test]
    fn observer_sees_committed_output_once() {
        let mut m = machine(&["LOM 4", "OUT", "INR", "OUT", "2", "FIN"]);
        let mut seen = Vec::new();
        let mut observer = |view: &View<'_>| seen.push((view.registers.outr, view.registers.pc));
        // Runs into FIN after the data cell
        assert_eq!(m.run(&mut observer), Ok(Status::Finished));
        assert_eq!(seen, [(Some(2), 2), (Some(3), 4)]);
    }

    struct Limit(u32);

    impl Observer for Limit {
        fn output(&mut self, _view: &View<'_>) {}
        fn between_steps(&mut self, _view: &View<'_>) -> Flow {
            if self.0 == 0 {
                return Flow::Stop;
            }
            self.0 -= 1;
            Flow::Continue
        }
    }

    #[test]
    fn observer_can_stop_endless_program() {
        let mut m = machine(&["loop:", "INR", "JUM loop"]);
        assert_eq!(m.run(&mut Limit(10)), Ok(Status::Finished));
        assert_eq!(m.registers().acc, 3);
        assert_eq!(m.step(&mut ()), Ok(StepOutcome::Finished));
    }

    #[test]
    fn reset_restores_loaded_state() {
        let mut m = machine(&["LOM 4", "STO 5", "OUT", "FIN", "9", "0"]);
        m.set_input(3);
        run(&mut m).unwrap();
        assert_eq!(m.memory().get(5), Some(&Cell::Literal(9)));
        m.reset();
        assert_eq!(m.status(), Status::Running);
        assert_eq!(m.memory().get(5), Some(&Cell::Literal(0)));
        assert_eq!(m.registers().outr, None);
        assert_eq!(m.registers().inpr, Some(3));
        assert_eq!(m.registers().pc, 0);
    }

    #[test]
    fn duplicate_label_rejected_at_load() {
        let program = Program::from_lines(["a:", "a:", "FIN"]);
        assert!(matches!(
            Machine::load(&program),
            Err(LoadError::DuplicateLabel { .. })
        ));
    }
}
