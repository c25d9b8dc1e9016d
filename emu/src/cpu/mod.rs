pub mod arm;
pub mod arm7tdmi;
pub mod condition;
pub mod error;
pub mod flags;
pub mod opcode;
pub mod psr;
pub mod registers;
pub mod thumb;
