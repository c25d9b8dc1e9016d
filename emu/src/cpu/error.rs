//! Error types for decode, execution and register access.

use thiserror::Error;

use crate::cpu::psr::CpuState;

/// Raised when a register index outside `0..=15` is used.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[error("register index {index} out of range (valid: 0..=15)")]
pub struct RegisterOutOfRange {
    pub index: usize,
}

/// A fetched word did not match any known instruction encoding.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum DecodeError {
    /// ARM word whose bits 25-27 select no supported class.
    #[error("unknown instruction type {type_bits:#05b} in ARM word {word:#010X}")]
    UnknownArmType { word: u32, type_bits: u32 },

    /// Thumb halfword matching none of the recognized formats.
    #[error("unrecognized Thumb format in halfword {halfword:#06X}")]
    UnknownThumbFormat { halfword: u16 },
}

/// A decoded instruction could not be carried out.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ExecutionError {
    /// Decoded fine but the operation has no implementation here.
    #[error("opcode {opcode:#010X} is not implemented")]
    UnimplementedOpcode { opcode: u32 },

    /// Load/store decodes but this core has no memory bus.
    #[error("load/store execution is not supported (no memory model)")]
    UnsupportedTransfer,

    #[error(transparent)]
    Register(#[from] RegisterOutOfRange),
}

/// A failure during a scheduler step, with fetch context attached.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum SimulatorError {
    #[error("decode failed at {address:#010X} ({state} state): {source}")]
    Decode {
        address: u32,
        state: CpuState,
        source: DecodeError,
    },

    #[error("execution failed at {address:#010X} ({state} state): {source}")]
    Execution {
        address: u32,
        state: CpuState,
        source: ExecutionError,
    },
}
