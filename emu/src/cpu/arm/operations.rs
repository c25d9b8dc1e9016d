//! Execution of decoded ARM instructions.

use crate::cpu::arm::alu_instruction::{AluSecondOperand, ArmModeAluInstruction};
use crate::cpu::arm::instruction::ArmModeInstruction;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::error::ExecutionError;
use crate::cpu::opcode::ArmModeOpcode;

impl Arm7tdmi {
    pub fn execute_arm(&mut self, op_code: &ArmModeOpcode) -> Result<(), ExecutionError> {
        if !self.cpsr.can_execute(op_code.condition) {
            tracing::debug!("condition not satisfied, skipping {op_code}");
            return Ok(());
        }
        tracing::debug!("executing {op_code}");

        match op_code.instruction {
            ArmModeInstruction::DataProcessing {
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
                ..
            } => self.data_processing(
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
                op_code.raw,
            ),
            ArmModeInstruction::Branch {
                link, byte_offset, ..
            } => {
                self.branch(link, byte_offset);
                Ok(())
            }
            ArmModeInstruction::SingleDataTransfer { .. } => {
                Err(ExecutionError::UnsupportedTransfer)
            }
        }
    }

    fn data_processing(
        &mut self,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: u32,
        destination: u32,
        op2: AluSecondOperand,
        raw: u32,
    ) -> Result<(), ExecutionError> {
        use ArmModeAluInstruction::{Add, And, Cmp, Eor, Mov, Mvn, Orr, Sub};

        let first_op = self.operand_register_value(rn)?;
        let second_op = match op2 {
            AluSecondOperand::Immediate { value } => value,
            AluSecondOperand::Register { register } => self.operand_register_value(register)?,
        };

        match alu_instruction {
            Mov => self.mov(destination, second_op, set_conditions)?,
            Mvn => self.mvn(destination, second_op, set_conditions)?,
            And => self.and(destination, first_op, second_op, set_conditions)?,
            Orr => self.orr(destination, first_op, second_op, set_conditions)?,
            Eor => self.eor(destination, first_op, second_op, set_conditions)?,
            Add => self.add(destination, first_op, second_op, set_conditions)?,
            Sub => self.sub(destination, first_op, second_op, set_conditions)?,
            Cmp => self.cmp(first_op, second_op),
            _ => return Err(ExecutionError::UnimplementedOpcode { opcode: raw }),
        }

        Ok(())
    }

    /// Branch target is relative to the prefetched PC (current + 8).
    /// With link, the return address is the instruction after this one.
    fn branch(&mut self, link: bool, byte_offset: i32) {
        let pc = self.registers.program_counter();
        if link {
            self.registers.set_link_register(pc.wrapping_add(4));
        }
        let target = pc.wrapping_add(8).wrapping_add_signed(byte_offset);
        self.registers.set_program_counter(target);
    }

    fn mov(&mut self, destination: u32, value: u32, set_conditions: bool) -> Result<(), ExecutionError> {
        self.registers.set_register_at(destination as usize, value)?;
        if set_conditions {
            self.cpsr.set_logical_flags(value);
        }
        Ok(())
    }

    fn mvn(&mut self, destination: u32, value: u32, set_conditions: bool) -> Result<(), ExecutionError> {
        self.mov(destination, !value, set_conditions)
    }

    fn and(
        &mut self,
        destination: u32,
        first_op: u32,
        second_op: u32,
        set_conditions: bool,
    ) -> Result<(), ExecutionError> {
        self.mov(destination, first_op & second_op, set_conditions)
    }

    fn orr(
        &mut self,
        destination: u32,
        first_op: u32,
        second_op: u32,
        set_conditions: bool,
    ) -> Result<(), ExecutionError> {
        self.mov(destination, first_op | second_op, set_conditions)
    }

    fn eor(
        &mut self,
        destination: u32,
        first_op: u32,
        second_op: u32,
        set_conditions: bool,
    ) -> Result<(), ExecutionError> {
        self.mov(destination, first_op ^ second_op, set_conditions)
    }

    fn add(
        &mut self,
        destination: u32,
        first_op: u32,
        second_op: u32,
        set_conditions: bool,
    ) -> Result<(), ExecutionError> {
        let op_result = Self::add_inner_op(first_op, second_op);
        self.registers
            .set_register_at(destination as usize, op_result.result)?;
        if set_conditions {
            self.cpsr.set_flags(op_result);
        }
        Ok(())
    }

    fn sub(
        &mut self,
        destination: u32,
        first_op: u32,
        second_op: u32,
        set_conditions: bool,
    ) -> Result<(), ExecutionError> {
        let op_result = Self::sub_inner_op(first_op, second_op);
        self.registers
            .set_register_at(destination as usize, op_result.result)?;
        if set_conditions {
            self.cpsr.set_flags(op_result);
        }
        Ok(())
    }

    fn cmp(&mut self, first_op: u32, second_op: u32) {
        self.cpsr.set_flags(Self::sub_inner_op(first_op, second_op));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::condition::Condition;
    use crate::cpu::psr::CpuState;
    use pretty_assertions::assert_eq;

    fn execute(cpu: &mut Arm7tdmi, word: u32) -> Result<(), ExecutionError> {
        let op_code = ArmModeOpcode::try_from(word).unwrap();
        cpu.execute_arm(&op_code)
    }

    #[test]
    fn mov_immediate_writes_destination() {
        let mut cpu = Arm7tdmi::new();
        execute(&mut cpu, 0xE3A0_1005).unwrap(); // MOV R1, #5
        assert_eq!(cpu.registers.register_at(1), Ok(5));
        // No S bit, flags untouched.
        assert!(!cpu.cpsr.zero_flag());
    }

    #[test]
    fn movs_zero_sets_zero_flag_only() {
        let mut cpu = Arm7tdmi::new();
        cpu.cpsr.set_carry_flag(true);
        execute(&mut cpu, 0xE3B0_0000).unwrap(); // MOVS R0, #0
        assert!(cpu.cpsr.zero_flag());
        assert!(!cpu.cpsr.sign_flag());
        // Logical operations preserve carry.
        assert!(cpu.cpsr.carry_flag());
    }

    #[test]
    fn add_register_operands() {
        let mut cpu = Arm7tdmi::new();
        cpu.registers.set_register_at(1, 5).unwrap();
        cpu.registers.set_register_at(2, 3).unwrap();
        execute(&mut cpu, 0xE081_3002).unwrap(); // ADD R3, R1, R2
        assert_eq!(cpu.registers.register_at(3), Ok(8));
    }

    #[test]
    fn adds_carry_and_overflow() {
        let mut cpu = Arm7tdmi::new();
        cpu.registers.set_register_at(0, 0xFFFF_FFFF).unwrap();
        cpu.registers.set_register_at(1, 1).unwrap();
        execute(&mut cpu, 0xE090_2001).unwrap(); // ADDS R2, R0, R1
        assert_eq!(cpu.registers.register_at(2), Ok(0));
        assert!(cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.overflow_flag());
    }

    #[test]
    fn cmp_equal_sets_zero_and_carry() {
        let mut cpu = Arm7tdmi::new();
        cpu.registers.set_register_at(3, 8).unwrap();
        cpu.registers.set_register_at(1, 8).unwrap();
        execute(&mut cpu, 0xE153_0001).unwrap(); // CMP R3, R1
        assert!(cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.overflow_flag());
        // Comparison leaves the destination slot alone.
        assert_eq!(cpu.registers.register_at(0), Ok(0));
    }

    #[test]
    fn logical_operations() {
        let mut cpu = Arm7tdmi::new();
        cpu.registers.set_register_at(0, 0b1100).unwrap();
        cpu.registers.set_register_at(1, 0b1010).unwrap();

        execute(&mut cpu, 0xE000_2001).unwrap(); // AND R2, R0, R1
        assert_eq!(cpu.registers.register_at(2), Ok(0b1000));

        execute(&mut cpu, 0xE180_3001).unwrap(); // ORR R3, R0, R1
        assert_eq!(cpu.registers.register_at(3), Ok(0b1110));

        execute(&mut cpu, 0xE020_4001).unwrap(); // EOR R4, R0, R1
        assert_eq!(cpu.registers.register_at(4), Ok(0b0110));

        execute(&mut cpu, 0xE3E0_5000).unwrap(); // MVN R5, #0
        assert_eq!(cpu.registers.register_at(5), Ok(0xFFFF_FFFF));
    }

    #[test]
    fn failed_condition_is_a_no_op() {
        let mut cpu = Arm7tdmi::new();
        // Z is clear, so MOVEQ must not execute.
        execute(&mut cpu, 0x03A0_1005).unwrap(); // MOVEQ R1, #5
        assert_eq!(cpu.registers.register_at(1), Ok(0));
    }

    #[test]
    fn branch_targets_prefetched_pc() {
        let mut cpu = Arm7tdmi::new();
        cpu.registers.set_program_counter(0x10);
        execute(&mut cpu, 0xEA00_0002).unwrap(); // B #+8
        assert_eq!(cpu.registers.program_counter(), 0x20);
    }

    #[test]
    fn branch_with_link_saves_return_address() {
        let mut cpu = Arm7tdmi::new();
        cpu.registers.set_program_counter(0x10);
        execute(&mut cpu, 0xEB00_0002).unwrap(); // BL #+8
        assert_eq!(cpu.registers.program_counter(), 0x20);
        assert_eq!(cpu.registers.link_register(), 0x14);
    }

    #[test]
    fn branch_backward() {
        let mut cpu = Arm7tdmi::new();
        cpu.registers.set_program_counter(0x20);
        execute(&mut cpu, 0xEAFF_FFFC).unwrap(); // B #-16
        assert_eq!(cpu.registers.program_counter(), 0x18);
    }

    #[test]
    fn conditional_branch_respects_flags() {
        let mut cpu = Arm7tdmi::new();
        cpu.registers.set_program_counter(0x10);
        // BNE with Z set: not taken, PC untouched.
        cpu.cpsr.set_zero_flag(true);
        execute(&mut cpu, 0x1A00_0001).unwrap();
        assert_eq!(cpu.registers.program_counter(), 0x10);

        cpu.cpsr.set_zero_flag(false);
        execute(&mut cpu, 0x1A00_0001).unwrap();
        assert_eq!(cpu.registers.program_counter(), 0x1C);
    }

    #[test]
    fn r15_operand_reads_prefetched_value() {
        let mut cpu = Arm7tdmi::new();
        cpu.registers.set_program_counter(0x100);
        execute(&mut cpu, 0xE1A0_000F).unwrap(); // MOV R0, R15
        assert_eq!(cpu.registers.register_at(0), Ok(0x108));
    }

    #[test]
    fn unimplemented_alu_opcode_is_reported() {
        let mut cpu = Arm7tdmi::new();
        // RSB R0, R1, R2
        let err = execute(&mut cpu, 0xE061_0002).unwrap_err();
        assert_eq!(
            err,
            ExecutionError::UnimplementedOpcode { opcode: 0xE061_0002 }
        );
    }

    #[test]
    fn load_store_execution_is_unsupported() {
        let mut cpu = Arm7tdmi::new();
        let err = execute(&mut cpu, 0xE591_2008).unwrap_err(); // LDR R2, [R1, #8]
        assert_eq!(err, ExecutionError::UnsupportedTransfer);
    }

    #[test]
    fn mov_pc_lr_returns() {
        let mut cpu = Arm7tdmi::new();
        cpu.registers.set_link_register(0x14);
        cpu.registers.set_program_counter(0x20);
        execute(&mut cpu, 0xE1A0_F00E).unwrap(); // MOV PC, LR
        assert_eq!(cpu.registers.program_counter(), 0x14);
        assert_eq!(cpu.cpu_state(), CpuState::Arm);
    }

    #[test]
    fn condition_wrapper_matches_instruction() {
        let op_code = ArmModeOpcode::try_from(0x1A00_0001).unwrap();
        assert_eq!(op_code.condition, Condition::NE);
    }
}
