//! ARM (32-bit) instruction decoding.
//!
//! Classification is driven by bits 25-27 of the word:
//!
//! ```text
//! 000 / 001  data processing (001 = immediate second operand)
//! 010 / 011  single data transfer (010 = immediate offset)
//! 101        branch / branch with link
//! ```
//!
//! Anything else is rejected with [`DecodeError::UnknownArmType`].

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{AluSecondOperand, ArmModeAluInstruction};
use crate::cpu::condition::Condition;
use crate::cpu::error::DecodeError;
use crate::cpu::flags::{LoadStoreKind, Offsetting, ReadWriteKind};

/// Offset part of a single data transfer.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum SingleDataTransferOffset {
    Immediate { offset: u32 },
    Register { register: u32 },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ArmModeInstruction {
    DataProcessing {
        condition: Condition,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: u32,
        destination: u32,
        op2: AluSecondOperand,
    },
    Branch {
        condition: Condition,
        link: bool,
        /// Sign-extended byte offset, already scaled by 4.
        byte_offset: i32,
    },
    SingleDataTransfer {
        condition: Condition,
        kind: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        offsetting: Offsetting,
        base_register: u32,
        source_destination: u32,
        offset: SingleDataTransferOffset,
    },
}

impl TryFrom<u32> for ArmModeInstruction {
    type Error = DecodeError;

    #[allow(clippy::cast_possible_truncation)]
    fn try_from(op_code: u32) -> Result<Self, Self::Error> {
        let condition = Condition::from(op_code.get_bits(28..=31) as u8);
        let type_bits = op_code.get_bits(25..=27);

        match type_bits {
            0b000 | 0b001 => {
                let alu_instruction = ArmModeAluInstruction::from(op_code.get_bits(21..=24));
                let set_conditions = op_code.get_bit(20);
                let rn = op_code.get_bits(16..=19);
                let destination = op_code.get_bits(12..=15);

                // I bit: immediate second operand, rotated right by
                // twice the 4-bit rotate field.
                let op2 = if op_code.get_bit(25) {
                    let rotate = op_code.get_bits(8..=11);
                    let immediate = op_code.get_bits(0..=7);
                    AluSecondOperand::Immediate {
                        value: immediate.rotate_right(rotate * 2),
                    }
                } else {
                    AluSecondOperand::Register {
                        register: op_code.get_bits(0..=3),
                    }
                };

                Ok(Self::DataProcessing {
                    condition,
                    alu_instruction,
                    set_conditions,
                    rn,
                    destination,
                    op2,
                })
            }
            0b101 => {
                let link = op_code.get_bit(24);
                // 24-bit two's complement offset in words.
                let mut offset_words = op_code.get_bits(0..=23);
                if offset_words.get_bit(23) {
                    offset_words |= 0xFF00_0000;
                }
                let byte_offset = (offset_words as i32) << 2;

                Ok(Self::Branch {
                    condition,
                    link,
                    byte_offset,
                })
            }
            0b010 | 0b011 => {
                let kind = LoadStoreKind::from(op_code.get_bit(20));
                let quantity = ReadWriteKind::from(op_code.get_bit(22));
                let write_back = op_code.get_bit(21);
                let offsetting = Offsetting::from(op_code.get_bit(23));
                let base_register = op_code.get_bits(16..=19);
                let source_destination = op_code.get_bits(12..=15);

                let offset = if op_code.get_bit(25) {
                    SingleDataTransferOffset::Register {
                        register: op_code.get_bits(0..=3),
                    }
                } else {
                    SingleDataTransferOffset::Immediate {
                        offset: op_code.get_bits(0..=11),
                    }
                };

                Ok(Self::SingleDataTransfer {
                    condition,
                    kind,
                    quantity,
                    write_back,
                    offsetting,
                    base_register,
                    source_destination,
                    offset,
                })
            }
            _ => Err(DecodeError::UnknownArmType {
                word: op_code,
                type_bits,
            }),
        }
    }
}

impl ArmModeInstruction {
    #[must_use]
    pub fn condition(&self) -> Condition {
        match self {
            Self::DataProcessing { condition, .. }
            | Self::Branch { condition, .. }
            | Self::SingleDataTransfer { condition, .. } => *condition,
        }
    }

    #[must_use]
    pub fn disassembler(&self) -> String {
        match self {
            Self::DataProcessing {
                condition,
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
            } => {
                let set = if *set_conditions && !alu_instruction.is_comparison() {
                    "S"
                } else {
                    ""
                };
                match alu_instruction {
                    ArmModeAluInstruction::Mov | ArmModeAluInstruction::Mvn => {
                        format!("{alu_instruction}{set}{condition} R{destination}, {op2}")
                    }
                    op if op.is_comparison() => {
                        format!("{alu_instruction}{condition} R{rn}, {op2}")
                    }
                    _ => {
                        format!("{alu_instruction}{set}{condition} R{destination}, R{rn}, {op2}")
                    }
                }
            }
            Self::Branch {
                condition,
                link,
                byte_offset,
            } => {
                let mnemonic = if *link { "BL" } else { "B" };
                format!("{mnemonic}{condition} #{byte_offset}")
            }
            Self::SingleDataTransfer {
                condition,
                kind,
                quantity,
                base_register,
                source_destination,
                offset,
                ..
            } => {
                let byte = match quantity {
                    ReadWriteKind::Byte => "B",
                    ReadWriteKind::Word => "",
                };
                let offset = match offset {
                    SingleDataTransferOffset::Immediate { offset } => format!("#{offset}"),
                    SingleDataTransferOffset::Register { register } => format!("R{register}"),
                };
                format!("{kind}{byte}{condition} R{source_destination}, [R{base_register}, {offset}]")
            }
        }
    }
}

impl std::fmt::Display for ArmModeInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.disassembler())
    }
}
