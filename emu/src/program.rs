//! Program images: instruction words pinned to explicit addresses.
//!
//! A program is a list of (address, word) pairs rather than a flat
//! memory buffer. Fetching is done by address equality, so sparse
//! layouts with gaps between regions are fine, and each word carries
//! the state it is meant to execute in.

use serde::{Deserialize, Serialize};

use crate::cpu::psr::CpuState;

/// ARM encoding of `MOV PC, LR`, treated as a subroutine return.
pub const ARM_RETURN: u32 = 0xE1A0_F00E;

/// Thumb encoding of `BX LR`, treated as a subroutine return.
pub const THUMB_RETURN: u16 = 0x4770;

/// One fetched unit: a 32-bit ARM word or a 16-bit Thumb halfword.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum InstructionWord {
    Arm(u32),
    Thumb(u16),
}

impl InstructionWord {
    /// The state this word is meant to execute in.
    #[must_use]
    pub const fn cpu_state(self) -> CpuState {
        match self {
            Self::Arm(_) => CpuState::Arm,
            Self::Thumb(_) => CpuState::Thumb,
        }
    }

    /// Return-idiom words that halt the scheduler once executed.
    #[must_use]
    pub const fn is_return_idiom(self) -> bool {
        matches!(
            self,
            Self::Arm(ARM_RETURN) | Self::Thumb(THUMB_RETURN)
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct ProgramEntry {
    pub address: u32,
    pub word: InstructionWord,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Program {
    entries: Vec<ProgramEntry>,
}

impl Program {
    #[must_use]
    pub fn new(entries: Vec<ProgramEntry>) -> Self {
        Self { entries }
    }

    /// Lays out ARM words contiguously from `base`, 4 bytes apart.
    #[must_use]
    pub fn from_arm_words(base: u32, words: &[u32]) -> Self {
        let entries = words
            .iter()
            .enumerate()
            .map(|(i, &word)| ProgramEntry {
                address: base.wrapping_add(i as u32 * 4),
                word: InstructionWord::Arm(word),
            })
            .collect();
        Self { entries }
    }

    /// Lays out Thumb halfwords contiguously from `base`, 2 bytes apart.
    #[must_use]
    pub fn from_thumb_halfwords(base: u32, halfwords: &[u16]) -> Self {
        let entries = halfwords
            .iter()
            .enumerate()
            .map(|(i, &halfword)| ProgramEntry {
                address: base.wrapping_add(i as u32 * 2),
                word: InstructionWord::Thumb(halfword),
            })
            .collect();
        Self { entries }
    }

    pub fn push(&mut self, entry: ProgramEntry) {
        self.entries.push(entry);
    }

    /// Finds the entry whose address equals `address` exactly. The
    /// first match wins when addresses are duplicated.
    #[must_use]
    pub fn entry_at(&self, address: u32) -> Option<ProgramEntry> {
        self.entries
            .iter()
            .find(|entry| entry.address == address)
            .copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
