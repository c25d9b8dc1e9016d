//! Thumb (16-bit) instruction decoding.
//!
//! Thumb formats overlap in their top bits, so the checks below are
//! ordered from most specific mask to least specific. In particular the
//! hi-register format (010001) must be tested before the ALU format
//! (010000), and the add/subtract format (00011) before the generic
//! move-shifted format (000).

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::error::DecodeError;
use crate::cpu::flags::{OperandKind, Operation, ShiftKind};
use crate::cpu::thumb::alu_instructions::{ThumbHighRegisterOperation, ThumbModeAluInstruction};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ThumbModeInstruction {
    MoveShiftedRegister {
        shift_kind: ShiftKind,
        /// Shift amount; for LSR/ASR the encoded 0 means shift by 32.
        offset: u16,
        source_register: u16,
        destination_register: u16,
    },
    AddSubtract {
        operand_kind: OperandKind,
        subtract: bool,
        /// Register number or 3-bit immediate, depending on `operand_kind`.
        register_or_immediate: u16,
        source_register: u16,
        destination_register: u16,
    },
    MoveCompareAddSubtractImm {
        operation: Operation,
        destination_register: u16,
        offset: u16,
    },
    AluOp {
        alu_instruction: ThumbModeAluInstruction,
        source_register: u16,
        destination_register: u16,
    },
    HiRegisterOpBX {
        register_operation: ThumbHighRegisterOperation,
        /// The H1 bit. Extends the destination into R8-R15, or turns
        /// BX into BLX.
        link: bool,
        /// Full 4-bit source (H2 folded in, bits 6-3).
        source_register: u16,
        /// Full 4-bit destination (H1 folded in).
        destination_register: u16,
    },
    CondBranch {
        condition: Condition,
        /// Sign-extended halfword count, not yet scaled.
        immediate_offset: i32,
    },
    UncondBranch {
        /// Sign-extended halfword count, not yet scaled.
        offset: i32,
    },
    SoftwareInterrupt {
        comment: u8,
    },
}

impl TryFrom<u16> for ThumbModeInstruction {
    type Error = DecodeError;

    #[allow(clippy::cast_possible_truncation)]
    fn try_from(op_code: u16) -> Result<Self, Self::Error> {
        Ok(if op_code.get_bits(10..=15) == 0b010001 {
            let link = op_code.get_bit(7);
            let h1 = u16::from(link) << 3;
            Self::HiRegisterOpBX {
                register_operation: op_code.get_bits(8..=9).into(),
                link,
                source_register: op_code.get_bits(3..=6),
                destination_register: h1 | op_code.get_bits(0..=2),
            }
        } else if op_code.get_bits(13..=15) == 0b001 {
            Self::MoveCompareAddSubtractImm {
                operation: op_code.get_bits(11..=12).into(),
                destination_register: op_code.get_bits(8..=10),
                offset: op_code.get_bits(0..=7),
            }
        } else if op_code.get_bits(11..=15) == 0b00011 {
            Self::AddSubtract {
                operand_kind: op_code.get_bit(10).into(),
                subtract: op_code.get_bit(9),
                register_or_immediate: op_code.get_bits(6..=8),
                source_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            }
        } else if op_code.get_bits(13..=15) == 0b000 {
            Self::MoveShiftedRegister {
                shift_kind: op_code.get_bits(11..=12).into(),
                offset: op_code.get_bits(6..=10),
                source_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            }
        } else if op_code.get_bits(10..=15) == 0b010000 {
            Self::AluOp {
                alu_instruction: op_code.get_bits(6..=9).into(),
                source_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            }
        } else if op_code.get_bits(12..=15) == 0b1101 && op_code.get_bits(8..=11) != 0xF {
            // 8-bit two's complement offset in halfwords.
            let mut offset = u32::from(op_code.get_bits(0..=7));
            if offset.get_bit(7) {
                offset |= 0xFFFF_FF00;
            }
            Self::CondBranch {
                condition: Condition::from(op_code.get_bits(8..=11) as u8),
                immediate_offset: offset as i32,
            }
        } else if op_code.get_bits(11..=15) == 0b11100 {
            // 11-bit two's complement offset in halfwords.
            let mut offset = u32::from(op_code.get_bits(0..=10));
            if offset.get_bit(10) {
                offset |= 0xFFFF_F800;
            }
            Self::UncondBranch {
                offset: offset as i32,
            }
        } else if op_code.get_bits(8..=15) == 0b1101_1111 {
            Self::SoftwareInterrupt {
                comment: op_code.get_bits(0..=7) as u8,
            }
        } else {
            return Err(DecodeError::UnknownThumbFormat { halfword: op_code });
        })
    }
}

impl ThumbModeInstruction {
    #[must_use]
    pub fn disassembler(&self) -> String {
        match self {
            Self::MoveShiftedRegister {
                shift_kind,
                offset,
                source_register,
                destination_register,
            } => format!("{shift_kind} R{destination_register}, R{source_register}, #{offset}"),
            Self::AddSubtract {
                operand_kind,
                subtract,
                register_or_immediate,
                source_register,
                destination_register,
            } => {
                let mnemonic = if *subtract { "SUB" } else { "ADD" };
                let operand = match operand_kind {
                    OperandKind::Immediate => format!("#{register_or_immediate}"),
                    OperandKind::Register => format!("R{register_or_immediate}"),
                };
                format!("{mnemonic} R{destination_register}, R{source_register}, {operand}")
            }
            Self::MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => format!("{operation} R{destination_register}, #{offset}"),
            Self::AluOp {
                alu_instruction,
                source_register,
                destination_register,
            } => format!("{alu_instruction} R{destination_register}, R{source_register}"),
            Self::HiRegisterOpBX {
                register_operation,
                link,
                source_register,
                destination_register,
            } => match register_operation {
                ThumbHighRegisterOperation::BxOrBlx => {
                    let mnemonic = if *link { "BLX" } else { "BX" };
                    format!("{mnemonic} R{source_register}")
                }
                _ => format!("{register_operation} R{destination_register}, R{source_register}"),
            },
            Self::CondBranch {
                condition,
                immediate_offset,
            } => format!("B{condition} #{}", immediate_offset * 2),
            Self::UncondBranch { offset } => format!("B #{}", offset * 2),
            Self::SoftwareInterrupt { comment } => format!("SWI #{comment}"),
        }
    }
}

impl std::fmt::Display for ThumbModeInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.disassembler())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_move_shifted() {
        // LSL R1, R2, #3
        let instruction = ThumbModeInstruction::try_from(0x00D1).unwrap();
        assert_eq!(
            instruction,
            ThumbModeInstruction::MoveShiftedRegister {
                shift_kind: ShiftKind::Lsl,
                offset: 3,
                source_register: 2,
                destination_register: 1,
            }
        );
        assert_eq!(instruction.disassembler(), "LSL R1, R2, #3");
    }

    #[test]
    fn add_subtract_wins_over_move_shifted() {
        // ADD R2, R0, R1: top bits 00011 overlap the move-shifted mask.
        let instruction = ThumbModeInstruction::try_from(0x1842).unwrap();
        assert_eq!(
            instruction,
            ThumbModeInstruction::AddSubtract {
                operand_kind: OperandKind::Register,
                subtract: false,
                register_or_immediate: 1,
                source_register: 0,
                destination_register: 2,
            }
        );
    }

    #[test]
    fn decode_subtract_immediate() {
        // SUB R0, R3, #7
        let instruction = ThumbModeInstruction::try_from(0x1FD8).unwrap();
        assert_eq!(
            instruction,
            ThumbModeInstruction::AddSubtract {
                operand_kind: OperandKind::Immediate,
                subtract: true,
                register_or_immediate: 7,
                source_register: 3,
                destination_register: 0,
            }
        );
        assert_eq!(instruction.disassembler(), "SUB R0, R3, #7");
    }

    #[test]
    fn decode_move_immediate() {
        // MOV R0, #5
        let instruction = ThumbModeInstruction::try_from(0x2005).unwrap();
        assert_eq!(
            instruction,
            ThumbModeInstruction::MoveCompareAddSubtractImm {
                operation: Operation::Mov,
                destination_register: 0,
                offset: 5,
            }
        );
    }

    #[test]
    fn decode_alu_op() {
        // AND R0, R1
        let instruction = ThumbModeInstruction::try_from(0x4008).unwrap();
        assert_eq!(
            instruction,
            ThumbModeInstruction::AluOp {
                alu_instruction: ThumbModeAluInstruction::And,
                source_register: 1,
                destination_register: 0,
            }
        );
    }

    #[test]
    fn hi_register_wins_over_alu() {
        // BX R3: bits 15-10 are 010001, one above the ALU mask.
        let instruction = ThumbModeInstruction::try_from(0x4718).unwrap();
        assert_eq!(
            instruction,
            ThumbModeInstruction::HiRegisterOpBX {
                register_operation: ThumbHighRegisterOperation::BxOrBlx,
                link: false,
                source_register: 3,
                destination_register: 0,
            }
        );
        assert_eq!(instruction.disassembler(), "BX R3");
    }

    #[test]
    fn decode_blx_and_high_destination() {
        // BLX R4 (H1 set)
        let instruction = ThumbModeInstruction::try_from(0x47A0).unwrap();
        let ThumbModeInstruction::HiRegisterOpBX { link, source_register, .. } = instruction
        else {
            panic!("expected hi-register format");
        };
        assert!(link);
        assert_eq!(source_register, 4);

        // MOV R10, R2 (H1 extends the destination)
        let instruction = ThumbModeInstruction::try_from(0x4692).unwrap();
        assert_eq!(
            instruction,
            ThumbModeInstruction::HiRegisterOpBX {
                register_operation: ThumbHighRegisterOperation::Mov,
                link: true,
                source_register: 2,
                destination_register: 10,
            }
        );
    }

    #[test]
    fn decode_conditional_branch() {
        // BNE #-4 (offset field 0xFC, halfwords)
        let instruction = ThumbModeInstruction::try_from(0xD1FC).unwrap();
        assert_eq!(
            instruction,
            ThumbModeInstruction::CondBranch {
                condition: Condition::NE,
                immediate_offset: -4,
            }
        );
    }

    #[test]
    fn condition_field_1111_is_swi_not_branch() {
        let instruction = ThumbModeInstruction::try_from(0xDF05).unwrap();
        assert_eq!(
            instruction,
            ThumbModeInstruction::SoftwareInterrupt { comment: 5 }
        );
    }

    #[test]
    fn decode_unconditional_branch() {
        // B #+6 (offset field 3)
        let instruction = ThumbModeInstruction::try_from(0xE003).unwrap();
        assert_eq!(instruction, ThumbModeInstruction::UncondBranch { offset: 3 });

        // B #-2 (11-bit offset field all ones)
        let instruction = ThumbModeInstruction::try_from(0xE7FF).unwrap();
        assert_eq!(instruction, ThumbModeInstruction::UncondBranch { offset: -1 });
    }

    #[test]
    fn unknown_format_is_rejected() {
        // Load/store formats are not part of this decoder.
        let err = ThumbModeInstruction::try_from(0x6812).unwrap_err();
        assert_eq!(err, DecodeError::UnknownThumbFormat { halfword: 0x6812 });
    }
}
