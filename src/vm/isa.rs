//! Instruction set definitions and instruction-word decoding.
//!
//! The [`for_each_opcode!`](crate::for_each_opcode) macro holds the canonical
//! opcode list and invokes a callback macro for code generation, so the enum,
//! the decoder, the mnemonics, and the parameter counts all come from a
//! single definition.
//!
//! # Instruction format
//!
//! An instruction is a single word followed by its parameters. The low two
//! decimal digits of the word select the opcode; the remaining digits, read
//! right-aligned from the hundreds place, give one addressing-mode digit per
//! parameter slot. `1002` is therefore `MUL` with modes
//! `[Position, Immediate, Position]`.

use crate::vm::errors::ExecError;

/// Invokes a callback macro with the complete opcode definition list.
///
/// Each entry is `Name = code, mnemonic, parameter count`.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            /// ADD a, b, dst ; dst = a + b
            Add = 1, "ADD", 3,
            /// MUL a, b, dst ; dst = a * b
            Multiply = 2, "MUL", 3,
            /// IN dst ; dst = next inbound value (suspends while none is ready)
            ReadInput = 3, "IN", 1,
            /// OUT a ; emit a on the outbound port
            WriteOutput = 4, "OUT", 1,
            /// JNZ a, target ; pc = target when a != 0
            JumpIfTrue = 5, "JNZ", 2,
            /// JZ a, target ; pc = target when a == 0
            JumpIfFalse = 6, "JZ", 2,
            /// LT a, b, dst ; dst = 1 when a < b, else 0
            LessThan = 7, "LT", 3,
            /// EQ a, b, dst ; dst = 1 when a == b, else 0
            Equals = 8, "EQ", 3,
            /// ARB a ; relative base += a
            AdjustRelativeBase = 9, "ARB", 1,
            /// HALT ; stop execution permanently
            Halt = 99, "HALT", 0,
        }
    };
}

macro_rules! define_opcodes {
    ( $( $(#[$doc:meta])* $name:ident = $code:literal, $mnemonic:literal, $params:literal, )* ) => {
        /// Operation selected by the low two decimal digits of an
        /// instruction word.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Opcode {
            $( $(#[$doc])* $name, )*
        }

        impl Opcode {
            /// Decodes the opcode digits of `word`, or `None` for anything
            /// outside the table.
            pub fn from_word(word: i64) -> Option<Self> {
                match word % 100 {
                    $( $code => Some(Self::$name), )*
                    _ => None,
                }
            }

            /// Assembly-style mnemonic, used by trace output.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $( Self::$name => $mnemonic, )*
                }
            }

            /// Number of parameter words following the instruction word.
            pub fn params(self) -> i64 {
                match self {
                    $( Self::$name => $params, )*
                }
            }
        }
    };
}

for_each_opcode!(define_opcodes);

/// How a parameter value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The operand is an address; read or write through it.
    Position,
    /// The operand is the literal value. Writing through an Immediate
    /// operand is illegal.
    Immediate,
    /// The operand is an offset added to the relative base to form the
    /// effective address.
    Relative,
}

impl Mode {
    fn from_digit(digit: i64) -> Option<Self> {
        match digit {
            0 => Some(Mode::Position),
            1 => Some(Mode::Immediate),
            2 => Some(Mode::Relative),
            _ => None,
        }
    }
}

/// Decoded view of the instruction word at the current program counter.
///
/// The view is ephemeral: it borrows nothing and is discarded after the
/// instruction is dispatched.
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    word: i64,
    addr: i64,
    opcode: Opcode,
}

impl Instruction {
    /// Decodes the instruction word `word` found at `addr`.
    ///
    /// Every mode digit is validated up front so the dispatch code never
    /// observes a half-decoded instruction.
    pub fn decode(word: i64, addr: i64) -> Result<Self, ExecError> {
        let opcode =
            Opcode::from_word(word).ok_or(ExecError::InvalidInstruction { word, addr })?;
        let instr = Self { word, addr, opcode };
        for slot in 1..=opcode.params() {
            instr.mode(slot)?;
        }
        Ok(instr)
    }

    /// The operation this word selects.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The raw instruction word.
    pub fn word(&self) -> i64 {
        self.word
    }

    /// Addressing mode of the 1-based parameter `slot`.
    pub fn mode(&self, slot: i64) -> Result<Mode, ExecError> {
        let digit = (self.word / (100 * 10_i64.pow(slot as u32 - 1))) % 10;
        Mode::from_digit(digit).ok_or(ExecError::InvalidInstruction {
            word: self.word,
            addr: self.addr,
        })
    }
}
