//! Core machine implementation: decode, dispatch, and the suspend/resume
//! execution contract.

use crate::debug;
use crate::vm::errors::ExecError;
use crate::vm::isa::{Instruction, Mode, Opcode};
use crate::vm::memory::{Memory, DEFAULT_MEMORY};
use crate::vm::program::Program;

/// Machine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Ready to execute the instruction at the program counter.
    Running,
    /// Suspended inside a read: no inbound value was available.
    NeedsInput,
    /// Suspended after a write: the produced value awaits its consumer.
    ProducedOutput,
    /// Terminal: the machine executed `HALT` or failed.
    Halted,
}

/// Outcome of a single [`Machine::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// The instruction completed and more remain.
    Continued,
    /// The machine is suspended until the caller supplies an input value.
    NeedsInput,
    /// The machine produced a value for the caller to deliver.
    Output(i64),
    /// The machine has halted; further steps are no-ops.
    Halted,
}

/// A virtual machine executing programs encoded as flat sequences of signed
/// 64-bit integers.
///
/// The machine owns its [`Memory`] exclusively; composition happens through
/// ports and harnesses, never by sharing memory. Two execution disciplines
/// are built on the single authoritative [`step`](Machine::step) function:
///
/// - **pull**: the caller pumps `step`, feeding inputs and draining outputs
///   explicitly. This is how the pipeline scheduler multiplexes many
///   machines on one thread without native concurrency primitives.
/// - **push**: [`run`](Machine::run) loops over `step` against a pair of
///   I/O callbacks, and [`network::node`](crate::network::node) does the
///   same against a pair of ports inside an async task.
///
/// Both disciplines produce identical output sequences and final memory for
/// the same program and input sequence.
#[derive(Debug)]
pub struct Machine {
    memory: Memory,
    pc: i64,
    relative_base: i64,
    status: Status,
}

impl Machine {
    /// Creates a machine with `program` loaded at address zero and memory
    /// pre-sized to [`DEFAULT_MEMORY`] cells.
    pub fn new(program: &Program) -> Self {
        Self::with_capacity(program, DEFAULT_MEMORY)
    }

    /// Creates a machine whose memory holds at least `min_cells` cells.
    pub fn with_capacity(program: &Program, min_cells: usize) -> Self {
        Self {
            memory: Memory::new(program.words(), min_cells),
            pc: 0,
            relative_base: 0,
            status: Status::Running,
        }
    }

    /// Current lifecycle state.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The memory image, for inspection after a run.
    pub fn memory(&self) -> &[i64] {
        self.memory.cells()
    }

    /// Executes the instruction at the program counter.
    ///
    /// `input` is consumed only when the current instruction is a read; it
    /// is ignored otherwise. A read reached with no `input` suspends the
    /// machine without advancing the program counter, so the retry
    /// re-executes the read.
    ///
    /// Stepping a halted machine is a no-op returning [`StepResult::Halted`]
    /// — memory is never touched again once the machine halts. Any error
    /// halts the machine irrecoverably before it is returned.
    pub fn step(&mut self, input: Option<i64>) -> Result<StepResult, ExecError> {
        if self.status == Status::Halted {
            return Ok(StepResult::Halted);
        }
        match self.dispatch(input) {
            Ok(result) => Ok(result),
            Err(e) => {
                self.status = Status::Halted;
                Err(e)
            }
        }
    }

    fn dispatch(&mut self, input: Option<i64>) -> Result<StepResult, ExecError> {
        let word = self.memory.read(self.pc)?;
        let instr = Instruction::decode(word, self.pc)?;
        debug!(
            "pc={} rb={} {}",
            self.pc,
            self.relative_base,
            instr.opcode().mnemonic()
        );

        let mut next_pc = self.pc + 1 + instr.opcode().params();
        let result = match instr.opcode() {
            Opcode::Add => {
                let (a, b) = (self.load(&instr, 1)?, self.load(&instr, 2)?);
                self.store(&instr, 3, a.wrapping_add(b))?;
                StepResult::Continued
            }
            Opcode::Multiply => {
                let (a, b) = (self.load(&instr, 1)?, self.load(&instr, 2)?);
                self.store(&instr, 3, a.wrapping_mul(b))?;
                StepResult::Continued
            }
            Opcode::ReadInput => match input {
                Some(value) => {
                    self.store(&instr, 1, value)?;
                    StepResult::Continued
                }
                None => {
                    self.status = Status::NeedsInput;
                    return Ok(StepResult::NeedsInput);
                }
            },
            Opcode::WriteOutput => StepResult::Output(self.load(&instr, 1)?),
            Opcode::JumpIfTrue => {
                let (a, target) = (self.load(&instr, 1)?, self.load(&instr, 2)?);
                if a != 0 {
                    next_pc = target;
                }
                StepResult::Continued
            }
            Opcode::JumpIfFalse => {
                let (a, target) = (self.load(&instr, 1)?, self.load(&instr, 2)?);
                if a == 0 {
                    next_pc = target;
                }
                StepResult::Continued
            }
            Opcode::LessThan => {
                let (a, b) = (self.load(&instr, 1)?, self.load(&instr, 2)?);
                self.store(&instr, 3, (a < b) as i64)?;
                StepResult::Continued
            }
            Opcode::Equals => {
                let (a, b) = (self.load(&instr, 1)?, self.load(&instr, 2)?);
                self.store(&instr, 3, (a == b) as i64)?;
                StepResult::Continued
            }
            Opcode::AdjustRelativeBase => {
                self.relative_base += self.load(&instr, 1)?;
                StepResult::Continued
            }
            Opcode::Halt => {
                self.status = Status::Halted;
                return Ok(StepResult::Halted);
            }
        };

        self.pc = next_pc;
        self.status = match result {
            StepResult::Output(_) => Status::ProducedOutput,
            _ => Status::Running,
        };
        Ok(result)
    }

    /// Value of the 1-based parameter `slot`.
    fn load(&mut self, instr: &Instruction, slot: i64) -> Result<i64, ExecError> {
        let raw = self.memory.read(self.pc + slot)?;
        match instr.mode(slot)? {
            Mode::Immediate => Ok(raw),
            Mode::Position => self.memory.read(raw),
            Mode::Relative => self.memory.read(self.relative_base + raw),
        }
    }

    /// Writes `value` through the destination parameter `slot`.
    fn store(&mut self, instr: &Instruction, slot: i64, value: i64) -> Result<(), ExecError> {
        let raw = self.memory.read(self.pc + slot)?;
        let addr = match instr.mode(slot)? {
            Mode::Position => raw,
            Mode::Relative => self.relative_base + raw,
            Mode::Immediate => {
                return Err(ExecError::InvalidWriteTarget {
                    word: instr.word(),
                    addr: self.pc,
                });
            }
        };
        self.memory.write(addr, value)
    }

    /// Runs to completion in the push discipline, pulling inputs from `read`
    /// and delivering outputs to `write`.
    ///
    /// `read` returning `None` means there is no supplying port and no
    /// buffered value: the run fails with [`ExecError::NoInputAvailable`]
    /// and the machine halts.
    pub fn run<R, W>(&mut self, mut read: R, mut write: W) -> Result<(), ExecError>
    where
        R: FnMut() -> Option<i64>,
        W: FnMut(i64),
    {
        loop {
            match self.step(None)? {
                StepResult::Continued => {}
                StepResult::Output(value) => write(value),
                StepResult::NeedsInput => {
                    let Some(value) = read() else {
                        self.status = Status::Halted;
                        return Err(ExecError::NoInputAvailable);
                    };
                    self.step(Some(value))?;
                }
                StepResult::Halted => return Ok(()),
            }
        }
    }

    /// Runs with a fixed input sequence, collecting every output.
    pub fn run_buffered(&mut self, inputs: &[i64]) -> Result<Vec<i64>, ExecError> {
        let mut pending = inputs.iter().copied();
        let mut outputs = Vec::new();
        self.run(|| pending.next(), |value| outputs.push(value))?;
        Ok(outputs)
    }
}
