//! Execution of decoded Thumb instructions.

use crate::bitwise::Bits;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::condition::Condition;
use crate::cpu::error::ExecutionError;
use crate::cpu::flags::{OperandKind, Operation, ShiftKind};
use crate::cpu::opcode::ThumbModeOpcode;
use crate::cpu::psr::CpuState;
use crate::cpu::thumb::alu_instructions::{ThumbHighRegisterOperation, ThumbModeAluInstruction};
use crate::cpu::thumb::instruction::ThumbModeInstruction;

impl Arm7tdmi {
    pub fn execute_thumb(&mut self, op_code: &ThumbModeOpcode) -> Result<(), ExecutionError> {
        tracing::debug!("executing {op_code}");

        match op_code.instruction {
            ThumbModeInstruction::MoveShiftedRegister {
                shift_kind,
                offset,
                source_register,
                destination_register,
            } => self.move_shifted_register(
                shift_kind,
                u32::from(offset),
                source_register,
                destination_register,
            ),
            ThumbModeInstruction::AddSubtract {
                operand_kind,
                subtract,
                register_or_immediate,
                source_register,
                destination_register,
            } => self.add_subtract(
                operand_kind,
                subtract,
                register_or_immediate,
                source_register,
                destination_register,
            ),
            ThumbModeInstruction::MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => self.move_compare_add_sub_imm(operation, destination_register, u32::from(offset)),
            ThumbModeInstruction::AluOp {
                alu_instruction,
                source_register,
                destination_register,
            } => self.alu_op(alu_instruction, source_register, destination_register),
            ThumbModeInstruction::HiRegisterOpBX {
                register_operation,
                link,
                source_register,
                destination_register,
            } => self.hi_register_operation(
                register_operation,
                link,
                source_register,
                destination_register,
            ),
            ThumbModeInstruction::CondBranch {
                condition,
                immediate_offset,
            } => {
                self.cond_branch(condition, immediate_offset);
                Ok(())
            }
            ThumbModeInstruction::UncondBranch { offset } => {
                self.uncond_branch(offset);
                Ok(())
            }
            ThumbModeInstruction::SoftwareInterrupt { comment } => {
                tracing::debug!("software interrupt #{comment}");
                Ok(())
            }
        }
    }

    /// Shifts update N and Z only in this core. An encoded amount of 0
    /// means shift by 32 for LSR and ASR, as the architecture defines.
    fn move_shifted_register(
        &mut self,
        shift_kind: ShiftKind,
        offset: u32,
        source_register: u16,
        destination_register: u16,
    ) -> Result<(), ExecutionError> {
        let value = self.registers.register_at(source_register.into())?;
        let result = match shift_kind {
            ShiftKind::Lsl => value << offset,
            ShiftKind::Lsr => {
                if offset == 0 {
                    0
                } else {
                    value >> offset
                }
            }
            ShiftKind::Asr => {
                let shift = if offset == 0 { 31 } else { offset };
                #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
                {
                    ((value as i32) >> shift) as u32
                }
            }
            ShiftKind::Ror => value.rotate_right(offset),
        };

        self.registers
            .set_register_at(destination_register.into(), result)?;
        self.cpsr.set_logical_flags(result);
        Ok(())
    }

    fn add_subtract(
        &mut self,
        operand_kind: OperandKind,
        subtract: bool,
        register_or_immediate: u16,
        source_register: u16,
        destination_register: u16,
    ) -> Result<(), ExecutionError> {
        let first_op = self.registers.register_at(source_register.into())?;
        let second_op = match operand_kind {
            OperandKind::Immediate => u32::from(register_or_immediate),
            OperandKind::Register => self.registers.register_at(register_or_immediate.into())?,
        };

        let op_result = if subtract {
            Self::sub_inner_op(first_op, second_op)
        } else {
            Self::add_inner_op(first_op, second_op)
        };

        self.registers
            .set_register_at(destination_register.into(), op_result.result)?;
        self.cpsr.set_flags(op_result);
        Ok(())
    }

    fn move_compare_add_sub_imm(
        &mut self,
        operation: Operation,
        destination_register: u16,
        offset: u32,
    ) -> Result<(), ExecutionError> {
        let destination = usize::from(destination_register);
        match operation {
            Operation::Mov => {
                self.registers.set_register_at(destination, offset)?;
                self.cpsr.set_logical_flags(offset);
            }
            Operation::Cmp => {
                let first_op = self.registers.register_at(destination)?;
                self.cpsr.set_flags(Self::sub_inner_op(first_op, offset));
            }
            Operation::Add => {
                let first_op = self.registers.register_at(destination)?;
                let op_result = Self::add_inner_op(first_op, offset);
                self.registers.set_register_at(destination, op_result.result)?;
                self.cpsr.set_flags(op_result);
            }
            Operation::Sub => {
                let first_op = self.registers.register_at(destination)?;
                let op_result = Self::sub_inner_op(first_op, offset);
                self.registers.set_register_at(destination, op_result.result)?;
                self.cpsr.set_flags(op_result);
            }
        }
        Ok(())
    }

    /// AND/EOR/ORR write back and update N and Z. CMP writes all four
    /// flags. The remaining operations are logged and skipped rather
    /// than failing the run.
    fn alu_op(
        &mut self,
        alu_instruction: ThumbModeAluInstruction,
        source_register: u16,
        destination_register: u16,
    ) -> Result<(), ExecutionError> {
        use ThumbModeAluInstruction::{And, Cmp, Eor, Orr};

        let destination = usize::from(destination_register);
        let first_op = self.registers.register_at(destination)?;
        let second_op = self.registers.register_at(source_register.into())?;

        match alu_instruction {
            And => {
                let result = first_op & second_op;
                self.registers.set_register_at(destination, result)?;
                self.cpsr.set_logical_flags(result);
            }
            Eor => {
                let result = first_op ^ second_op;
                self.registers.set_register_at(destination, result)?;
                self.cpsr.set_logical_flags(result);
            }
            Orr => {
                let result = first_op | second_op;
                self.registers.set_register_at(destination, result)?;
                self.cpsr.set_logical_flags(result);
            }
            Cmp => self.cpsr.set_flags(Self::sub_inner_op(first_op, second_op)),
            other => {
                tracing::warn!("ALU operation {other} not implemented, skipping");
            }
        }
        Ok(())
    }

    fn hi_register_operation(
        &mut self,
        register_operation: ThumbHighRegisterOperation,
        link: bool,
        source_register: u16,
        destination_register: u16,
    ) -> Result<(), ExecutionError> {
        let source_value = self.operand_register_value(source_register.into())?;
        let destination = usize::from(destination_register);

        match register_operation {
            ThumbHighRegisterOperation::Add => {
                let first_op = self.operand_register_value(destination_register.into())?;
                // Hi-register add does not touch the flags.
                self.registers
                    .set_register_at(destination, first_op.wrapping_add(source_value))?;
            }
            ThumbHighRegisterOperation::Cmp => {
                let first_op = self.operand_register_value(destination_register.into())?;
                self.cpsr
                    .set_flags(Self::sub_inner_op(first_op, source_value));
            }
            ThumbHighRegisterOperation::Mov => {
                self.registers.set_register_at(destination, source_value)?;
            }
            ThumbHighRegisterOperation::BxOrBlx => {
                self.branch_and_exchange(link, source_value);
            }
        }
        Ok(())
    }

    /// Bit 0 of the target selects the new state. The state switch
    /// happens before the PC write so the target is aligned with the
    /// new state's mask. BLX saves a Thumb-flagged return address.
    fn branch_and_exchange(&mut self, link: bool, target: u32) {
        if link {
            let return_address = self.registers.program_counter().wrapping_add(2) | 1;
            self.registers.set_link_register(return_address);
        }

        let new_state = if target.get_bit(0) {
            CpuState::Thumb
        } else {
            CpuState::Arm
        };
        self.cpsr.set_cpu_state(new_state);

        let mask = match new_state {
            CpuState::Thumb => 0xFFFF_FFFE,
            CpuState::Arm => 0xFFFF_FFFC,
        };
        self.registers.set_program_counter(target & mask);
    }

    fn cond_branch(&mut self, condition: Condition, immediate_offset: i32) {
        if !self.cpsr.can_execute(condition) {
            return;
        }
        self.thumb_branch(immediate_offset);
    }

    fn uncond_branch(&mut self, offset: i32) {
        self.thumb_branch(offset);
    }

    /// Target is relative to the prefetched PC (current + 4), with the
    /// halfword offset doubled and bit 0 cleared.
    fn thumb_branch(&mut self, halfword_offset: i32) {
        let pc = self.registers.program_counter();
        let target = pc.wrapping_add(4).wrapping_add_signed(halfword_offset * 2) & !1;
        self.registers.set_program_counter(target);
    }
}
