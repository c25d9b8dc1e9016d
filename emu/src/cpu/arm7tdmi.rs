//! The processor core: register file, status register and the shared
//! arithmetic helpers both execution engines build on.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::ArithmeticOpResult;
use crate::cpu::error::RegisterOutOfRange;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::registers::Registers;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arm7tdmi {
    pub registers: Registers,
    pub cpsr: Psr,
}

impl Arm7tdmi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cpu_state(&self) -> CpuState {
        self.cpsr.cpu_state()
    }

    /// Switches ARM/Thumb state and realigns the program counter to the
    /// new state's instruction boundary.
    pub fn set_cpu_state(&mut self, state: CpuState) {
        self.cpsr.set_cpu_state(state);
        let mask = match state {
            CpuState::Thumb => 0xFFFF_FFFE,
            CpuState::Arm => 0xFFFF_FFFC,
        };
        let pc = self.registers.program_counter();
        self.registers.set_program_counter(pc & mask);
    }

    /// Reads a register as an instruction operand. R15 reads as the
    /// current PC plus the pipeline prefetch offset (8 in ARM state,
    /// 4 in Thumb state).
    pub(crate) fn operand_register_value(&self, reg: u32) -> Result<u32, RegisterOutOfRange> {
        let reg = reg as usize;
        if reg == crate::cpu::registers::REG_PROGRAM_COUNTER {
            let offset = self.cpu_state().instruction_size() * 2;
            Ok(self.registers.program_counter().wrapping_add(offset))
        } else {
            self.registers.register_at(reg)
        }
    }

    /// Addition through 64-bit arithmetic so the carry out is the
    /// 33rd bit of the true sum.
    pub(crate) fn add_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
        let wide = u64::from(first_op) + u64::from(second_op);
        #[allow(clippy::cast_possible_truncation)]
        let result = wide as u32;

        let same_sign = first_op.get_bit(31) == second_op.get_bit(31);

        ArithmeticOpResult {
            result,
            carry: wide > u64::from(u32::MAX),
            overflow: same_sign && (first_op.get_bit(31) != result.get_bit(31)),
            sign: result.get_bit(31),
            zero: result == 0,
        }
    }

    /// Subtraction with the ARM borrow convention: carry is set when no
    /// borrow occurred, i.e. when `first_op >= second_op` unsigned.
    pub(crate) fn sub_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
        let result = first_op.wrapping_sub(second_op);

        ArithmeticOpResult {
            result,
            carry: first_op >= second_op,
            overflow: (first_op.get_bit(31) != second_op.get_bit(31))
                && (result.get_bit(31) != first_op.get_bit(31)),
            sign: result.get_bit(31),
            zero: result == 0,
        }
    }
}
