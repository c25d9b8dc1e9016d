//! General purpose register file (R0-R15).
//!
//! R13 is conventionally the stack pointer, R14 the link register and
//! R15 the program counter. The PC is stored in the same array as the
//! others so instructions that name R15 as an operand read and write it
//! like any register.

use serde::{Deserialize, Serialize};

use crate::cpu::error::RegisterOutOfRange;

pub const REG_SP: usize = 13;
pub const REG_LR: usize = 14;
pub const REG_PROGRAM_COUNTER: usize = 15;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers([u32; 16]);

impl Registers {
    pub fn set_register_at(&mut self, reg: usize, value: u32) -> Result<(), RegisterOutOfRange> {
        let slot = self
            .0
            .get_mut(reg)
            .ok_or(RegisterOutOfRange { index: reg })?;
        *slot = value;
        Ok(())
    }

    pub fn register_at(&self, reg: usize) -> Result<u32, RegisterOutOfRange> {
        self.0
            .get(reg)
            .copied()
            .ok_or(RegisterOutOfRange { index: reg })
    }

    #[must_use]
    pub const fn program_counter(&self) -> u32 {
        self.0[REG_PROGRAM_COUNTER]
    }

    pub fn set_program_counter(&mut self, new_value: u32) {
        self.0[REG_PROGRAM_COUNTER] = new_value;
    }

    pub fn advance_program_counter(&mut self, bytes: u32) {
        self.0[REG_PROGRAM_COUNTER] = self.0[REG_PROGRAM_COUNTER].wrapping_add(bytes);
    }

    pub fn set_link_register(&mut self, value: u32) {
        self.0[REG_LR] = value;
    }

    #[must_use]
    pub const fn link_register(&self) -> u32 {
        self.0[REG_LR]
    }
}
