pub mod alu_instructions;
pub mod instruction;
pub mod operations;
