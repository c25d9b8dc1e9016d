//! A constrained ARM32/Thumb16 instruction-set simulator.
//!
//! Programs are address-pinned instruction words executed by an
//! ARM7TDMI-style core: data processing, branches and Thumb
//! interworking, with condition flags tracked through wide arithmetic.
//! There is no memory bus; the observable machine is the register file,
//! the status register and the run counters.

pub mod bitwise;
pub mod cpu;
pub mod program;
pub mod simulator;
