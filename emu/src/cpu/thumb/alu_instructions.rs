//! Operation selectors for the Thumb ALU and hi-register formats.

use serde::{Deserialize, Serialize};

/// The 16 operations of the Thumb ALU format (bits 9-6).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ThumbModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Lsl = 0x2,
    Lsr = 0x3,
    Asr = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Ror = 0x7,
    Tst = 0x8,
    Neg = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mul = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl From<u16> for ThumbModeAluInstruction {
    fn from(alu_op_code: u16) -> Self {
        match alu_op_code {
            0x0 => Self::And,
            0x1 => Self::Eor,
            0x2 => Self::Lsl,
            0x3 => Self::Lsr,
            0x4 => Self::Asr,
            0x5 => Self::Adc,
            0x6 => Self::Sbc,
            0x7 => Self::Ror,
            0x8 => Self::Tst,
            0x9 => Self::Neg,
            0xA => Self::Cmp,
            0xB => Self::Cmn,
            0xC => Self::Orr,
            0xD => Self::Mul,
            0xE => Self::Bic,
            0xF => Self::Mvn,
            _ => unreachable!("bits 6-9 are a 4-bit field"),
        }
    }
}

impl std::fmt::Display for ThumbModeAluInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Eor => f.write_str("EOR"),
            Self::Lsl => f.write_str("LSL"),
            Self::Lsr => f.write_str("LSR"),
            Self::Asr => f.write_str("ASR"),
            Self::Adc => f.write_str("ADC"),
            Self::Sbc => f.write_str("SBC"),
            Self::Ror => f.write_str("ROR"),
            Self::Tst => f.write_str("TST"),
            Self::Neg => f.write_str("NEG"),
            Self::Cmp => f.write_str("CMP"),
            Self::Cmn => f.write_str("CMN"),
            Self::Orr => f.write_str("ORR"),
            Self::Mul => f.write_str("MUL"),
            Self::Bic => f.write_str("BIC"),
            Self::Mvn => f.write_str("MVN"),
        }
    }
}

/// Operation selector of the hi-register/branch-exchange format
/// (bits 9-8).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ThumbHighRegisterOperation {
    Add = 0b00,
    Cmp = 0b01,
    Mov = 0b10,
    BxOrBlx = 0b11,
}

impl From<u16> for ThumbHighRegisterOperation {
    fn from(op: u16) -> Self {
        match op {
            0b00 => Self::Add,
            0b01 => Self::Cmp,
            0b10 => Self::Mov,
            0b11 => Self::BxOrBlx,
            _ => unreachable!("bits 8-9 are a 2-bit field"),
        }
    }
}

impl std::fmt::Display for ThumbHighRegisterOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => f.write_str("ADD"),
            Self::Cmp => f.write_str("CMP"),
            Self::Mov => f.write_str("MOV"),
            Self::BxOrBlx => f.write_str("BX"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn alu_field_round_trips() {
        for code in 0x0..=0xFu16 {
            let op = ThumbModeAluInstruction::from(code);
            assert_eq!(op as u16, code);
        }
    }

    #[test]
    fn high_register_field_round_trips() {
        for code in 0b00..=0b11u16 {
            let op = ThumbHighRegisterOperation::from(code);
            assert_eq!(op as u16, code);
        }
    }
}
