//! Decoded-instruction wrappers that keep the raw word alongside the
//! decoded form, mostly for logging and error reporting.

use std::fmt::{Display, Formatter};
use std::ops::Deref;

use crate::cpu::arm::instruction::ArmModeInstruction;
use crate::cpu::condition::Condition;
use crate::cpu::error::DecodeError;
use crate::cpu::thumb::instruction::ThumbModeInstruction;

pub struct ArmModeOpcode {
    pub instruction: ArmModeInstruction,
    pub condition: Condition,
    pub raw: u32,
}

impl TryFrom<u32> for ArmModeOpcode {
    type Error = DecodeError;

    fn try_from(op_code: u32) -> Result<Self, Self::Error> {
        let instruction = ArmModeInstruction::try_from(op_code)?;
        Ok(Self {
            condition: instruction.condition(),
            instruction,
            raw: op_code,
        })
    }
}

impl Deref for ArmModeOpcode {
    type Target = ArmModeInstruction;

    fn deref(&self) -> &Self::Target {
        &self.instruction
    }
}

impl Display for ArmModeOpcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010X}: {}", self.raw, self.instruction.disassembler())
    }
}

pub struct ThumbModeOpcode {
    pub instruction: ThumbModeInstruction,
    pub raw: u16,
}

impl TryFrom<u16> for ThumbModeOpcode {
    type Error = DecodeError;

    fn try_from(op_code: u16) -> Result<Self, Self::Error> {
        Ok(Self {
            instruction: ThumbModeInstruction::try_from(op_code)?,
            raw: op_code,
        })
    }
}

impl Deref for ThumbModeOpcode {
    type Target = ThumbModeInstruction;

    fn deref(&self) -> &Self::Target {
        &self.instruction
    }
}

impl Display for ThumbModeOpcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}: {}", self.raw, self.instruction.disassembler())
    }
}
