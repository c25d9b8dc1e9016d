pub mod alu_instruction;
pub mod instruction;
pub mod operations;
