//! The fetch/decode/execute scheduler.
//!
//! Each step fetches the program entry whose address equals the current
//! PC, corrects the CPU state if it disagrees with the fetched word,
//! executes, and then either advances the PC past the instruction or
//! leaves the branch target in place. A run halts on a return idiom, on
//! a PC with no matching entry, or at the cycle ceiling.

use serde::{Deserialize, Serialize};

use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::error::SimulatorError;
use crate::cpu::opcode::{ArmModeOpcode, ThumbModeOpcode};
use crate::cpu::psr::CpuState;
use crate::cpu::thumb::instruction::ThumbModeInstruction;
use crate::program::{InstructionWord, Program};

/// Why a run stopped.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum HaltReason {
    /// The PC matched no program entry.
    OutOfProgram,

    /// A return idiom (`MOV PC, LR` or `BX LR`) was executed.
    Returned,

    /// The configured cycle ceiling was reached.
    CycleLimit,

    /// A decode or execution failure was reported. Fatal: the error
    /// surfaces once and the simulator stays halted.
    Failed,
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfProgram => f.write_str("out of program"),
            Self::Returned => f.write_str("returned"),
            Self::CycleLimit => f.write_str("cycle limit reached"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ExecutionState {
    Running,
    Halted(HaltReason),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Hard ceiling on executed instructions. Reaching it is a halt,
    /// not an error, so runaway loops still produce a summary.
    pub max_cycles: u32,
    pub initial_pc: u32,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_cycles: 10_000,
            initial_pc: 0,
        }
    }
}

/// Counters and halt reason of a completed run.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub cycles: u32,
    pub arm_cycles: u32,
    pub thumb_cycles: u32,
    pub mode_switches: u32,
    pub branches_taken: u32,
    /// Comment fields of the software interrupts hit, in order.
    pub software_interrupts: Vec<u8>,
    pub halt: HaltReason,
}

#[derive(Debug, Clone)]
pub struct Simulator {
    pub cpu: Arm7tdmi,
    program: Program,
    config: SimulatorConfig,
    state: ExecutionState,
    cycles: u32,
    arm_cycles: u32,
    thumb_cycles: u32,
    mode_switches: u32,
    branches_taken: u32,
    software_interrupts: Vec<u8>,
}

impl Simulator {
    #[must_use]
    pub fn new(program: Program, config: SimulatorConfig) -> Self {
        let mut cpu = Arm7tdmi::new();
        cpu.registers.set_program_counter(config.initial_pc);

        // Start in the state of the entry point, if there is one.
        if let Some(entry) = program.entry_at(config.initial_pc) {
            cpu.set_cpu_state(entry.word.cpu_state());
        }

        Self {
            cpu,
            program,
            config,
            state: ExecutionState::Running,
            cycles: 0,
            arm_cycles: 0,
            thumb_cycles: 0,
            mode_switches: 0,
            branches_taken: 0,
            software_interrupts: Vec::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> ExecutionState {
        self.state
    }

    #[must_use]
    pub const fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Executes one instruction. Returns the state after the step; once
    /// halted, further calls are no-ops.
    pub fn step(&mut self) -> Result<ExecutionState, SimulatorError> {
        if let ExecutionState::Halted(_) = self.state {
            return Ok(self.state);
        }

        if self.cycles >= self.config.max_cycles {
            tracing::warn!(
                "cycle limit of {} reached, halting",
                self.config.max_cycles
            );
            return Ok(self.halt(HaltReason::CycleLimit));
        }

        let pc = self.cpu.registers.program_counter();
        let Some(entry) = self.program.entry_at(pc) else {
            tracing::debug!("no instruction at {pc:#010X}, halting");
            return Ok(self.halt(HaltReason::OutOfProgram));
        };

        // The fetched word knows which state it belongs to. A mismatch
        // (e.g. falling through from ARM code into a Thumb region) is
        // corrected rather than faulted.
        let entry_state = entry.word.cpu_state();
        if self.cpu.cpu_state() != entry_state {
            tracing::debug!(
                "state mismatch at {pc:#010X}: CPU in {}, word is {entry_state}",
                self.cpu.cpu_state()
            );
            self.cpu.set_cpu_state(entry_state);
            self.mode_switches += 1;
        }

        let old_pc = self.cpu.registers.program_counter();
        if let Err(error) = self.dispatch(entry.word, old_pc) {
            // Fatal, not retried: the error surfaces to the caller and
            // the simulator halts so further steps are no-ops.
            self.halt(HaltReason::Failed);
            return Err(error);
        }

        if self.cpu.cpu_state() != entry_state {
            self.mode_switches += 1;
        }

        // An unchanged PC means sequential flow; anything else was a
        // taken branch and the target is already in place.
        if self.cpu.registers.program_counter() == old_pc {
            self.cpu
                .registers
                .advance_program_counter(self.cpu.cpu_state().instruction_size());
        } else {
            self.branches_taken += 1;
        }

        self.cycles += 1;
        match entry_state {
            CpuState::Arm => self.arm_cycles += 1,
            CpuState::Thumb => self.thumb_cycles += 1,
        }

        if entry.word.is_return_idiom() {
            tracing::debug!("return idiom at {pc:#010X}, halting");
            return Ok(self.halt(HaltReason::Returned));
        }

        Ok(self.state)
    }

    /// Runs until halted and reports the counters.
    pub fn run(&mut self) -> Result<RunSummary, SimulatorError> {
        loop {
            if let ExecutionState::Halted(reason) = self.step()? {
                return Ok(RunSummary {
                    cycles: self.cycles,
                    arm_cycles: self.arm_cycles,
                    thumb_cycles: self.thumb_cycles,
                    mode_switches: self.mode_switches,
                    branches_taken: self.branches_taken,
                    software_interrupts: self.software_interrupts.clone(),
                    halt: reason,
                });
            }
        }
    }

    fn dispatch(&mut self, word: InstructionWord, address: u32) -> Result<(), SimulatorError> {
        match word {
            InstructionWord::Arm(raw) => {
                let op_code =
                    ArmModeOpcode::try_from(raw).map_err(|source| SimulatorError::Decode {
                        address,
                        state: CpuState::Arm,
                        source,
                    })?;
                self.cpu
                    .execute_arm(&op_code)
                    .map_err(|source| SimulatorError::Execution {
                        address,
                        state: CpuState::Arm,
                        source,
                    })
            }
            InstructionWord::Thumb(raw) => {
                let op_code =
                    ThumbModeOpcode::try_from(raw).map_err(|source| SimulatorError::Decode {
                        address,
                        state: CpuState::Thumb,
                        source,
                    })?;
                if let ThumbModeInstruction::SoftwareInterrupt { comment } = op_code.instruction {
                    self.software_interrupts.push(comment);
                }
                self.cpu
                    .execute_thumb(&op_code)
                    .map_err(|source| SimulatorError::Execution {
                        address,
                        state: CpuState::Thumb,
                        source,
                    })
            }
        }
    }

    fn halt(&mut self, reason: HaltReason) -> ExecutionState {
        self.state = ExecutionState::Halted(reason);
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::error::DecodeError;
    use crate::program::ProgramEntry;
    use pretty_assertions::assert_eq;

    const ARM_RETURN: u32 = crate::program::ARM_RETURN;
    const THUMB_RETURN: u16 = crate::program::THUMB_RETURN;

    #[test]
    fn arm_arithmetic_program_runs_to_return() {
        // MOV R1, #5 / MOV R2, #3 / ADD R3, R1, R2 / CMP R3, R1 /
        // MOV PC, LR
        let program = Program::from_arm_words(
            0,
            &[0xE3A0_1005, 0xE3A0_2003, 0xE081_3002, 0xE153_0001, ARM_RETURN],
        );
        let mut simulator = Simulator::new(program, SimulatorConfig::default());
        let summary = simulator.run().unwrap();

        assert_eq!(simulator.cpu.registers.register_at(1), Ok(5));
        assert_eq!(simulator.cpu.registers.register_at(2), Ok(3));
        assert_eq!(simulator.cpu.registers.register_at(3), Ok(8));
        assert!(!simulator.cpu.cpsr.zero_flag());
        assert!(!simulator.cpu.cpsr.sign_flag());
        assert!(simulator.cpu.cpsr.carry_flag());
        assert!(!simulator.cpu.cpsr.overflow_flag());

        assert_eq!(summary.halt, HaltReason::Returned);
        assert_eq!(summary.cycles, 5);
        assert_eq!(summary.arm_cycles, 5);
        assert_eq!(summary.thumb_cycles, 0);
    }

    #[test]
    fn branch_with_link_lands_on_the_prefetched_target() {
        let mut program = Program::from_arm_words(0x10, &[0xEB00_0002]); // BL #+8
        program.push(ProgramEntry {
            address: 0x20,
            word: InstructionWord::Arm(ARM_RETURN),
        });
        let config = SimulatorConfig {
            initial_pc: 0x10,
            ..SimulatorConfig::default()
        };
        let mut simulator = Simulator::new(program, config);
        let summary = simulator.run().unwrap();

        assert_eq!(simulator.cpu.registers.link_register(), 0x14);
        // MOV PC, LR sent the PC back to the return address.
        assert_eq!(simulator.cpu.registers.program_counter(), 0x14);
        assert_eq!(summary.halt, HaltReason::Returned);
        assert_eq!(summary.branches_taken, 2);
    }

    #[test]
    fn thumb_program_with_software_interrupt() {
        // MOV R0, #5 / ADD R0, #3 / SWI #5 / BX LR
        let program = Program::from_thumb_halfwords(0, &[0x2005, 0x3003, 0xDF05, THUMB_RETURN]);
        let mut simulator = Simulator::new(program, SimulatorConfig::default());
        let summary = simulator.run().unwrap();

        assert_eq!(simulator.cpu.registers.register_at(0), Ok(8));
        assert_eq!(summary.software_interrupts, vec![5]);
        assert_eq!(summary.thumb_cycles, 4);
        assert_eq!(summary.halt, HaltReason::Returned);
    }

    #[test]
    fn bx_interworks_from_thumb_to_arm() {
        // Thumb BX R3 into an ARM region at 0x100.
        let mut program = Program::from_thumb_halfwords(0, &[0x4718]);
        program.push(ProgramEntry {
            address: 0x100,
            word: InstructionWord::Arm(0xE3A0_1005), // MOV R1, #5
        });
        program.push(ProgramEntry {
            address: 0x104,
            word: InstructionWord::Arm(ARM_RETURN),
        });

        let mut simulator = Simulator::new(program, SimulatorConfig::default());
        simulator.cpu.registers.set_register_at(3, 0x100).unwrap();
        let summary = simulator.run().unwrap();

        assert_eq!(simulator.cpu.registers.register_at(1), Ok(5));
        assert_eq!(simulator.cpu.cpu_state(), CpuState::Arm);
        assert_eq!(summary.mode_switches, 1);
        assert_eq!(summary.arm_cycles, 2);
        assert_eq!(summary.thumb_cycles, 1);
    }

    #[test]
    fn state_mismatch_is_corrected_not_faulted() {
        // CPU starts in ARM (empty entry point), entry is Thumb.
        let mut program = Program::from_arm_words(0, &[0xE3A0_1005]);
        program.push(ProgramEntry {
            address: 4,
            word: InstructionWord::Thumb(0x2007), // MOV R0, #7
        });
        let mut simulator = Simulator::new(program, SimulatorConfig::default());
        let summary = simulator.run().unwrap();

        assert_eq!(simulator.cpu.registers.register_at(0), Ok(7));
        assert_eq!(summary.mode_switches, 1);
        // After the Thumb word the PC advances by 2 to address 6,
        // which has no entry.
        assert_eq!(summary.halt, HaltReason::OutOfProgram);
    }

    #[test]
    fn pc_without_entry_halts() {
        let program = Program::from_arm_words(0, &[0xE3A0_1005]);
        let mut simulator = Simulator::new(program, SimulatorConfig::default());
        let summary = simulator.run().unwrap();

        assert_eq!(summary.halt, HaltReason::OutOfProgram);
        assert_eq!(summary.cycles, 1);
        assert_eq!(simulator.cpu.registers.program_counter(), 4);
    }

    #[test]
    fn tight_loop_hits_the_cycle_ceiling() {
        // Two branches bouncing between addresses 0 and 4.
        let program = Program::from_arm_words(0, &[0xEAFF_FFFF, 0xEAFF_FFFD]);
        let config = SimulatorConfig {
            max_cycles: 10,
            ..SimulatorConfig::default()
        };
        let mut simulator = Simulator::new(program, config);
        let summary = simulator.run().unwrap();

        assert_eq!(summary.halt, HaltReason::CycleLimit);
        assert_eq!(summary.cycles, 10);
        assert_eq!(summary.branches_taken, 10);
    }

    #[test]
    fn untaken_branch_advances_sequentially() {
        // BEQ with Z clear falls through to the return.
        let program = Program::from_arm_words(0, &[0x0A00_0010, ARM_RETURN]);
        let mut simulator = Simulator::new(program, SimulatorConfig::default());
        let summary = simulator.run().unwrap();

        assert_eq!(summary.branches_taken, 1); // only MOV PC, LR
        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.halt, HaltReason::Returned);
    }

    #[test]
    fn decode_failure_reports_fetch_context() {
        let program = Program::from_arm_words(0x40, &[0xEE00_0000]);
        let config = SimulatorConfig {
            initial_pc: 0x40,
            ..SimulatorConfig::default()
        };
        let mut simulator = Simulator::new(program, config);
        let err = simulator.run().unwrap_err();

        assert_eq!(
            err,
            SimulatorError::Decode {
                address: 0x40,
                state: CpuState::Arm,
                source: DecodeError::UnknownArmType {
                    word: 0xEE00_0000,
                    type_bits: 0b111,
                },
            }
        );
    }

    #[test]
    fn fatal_failure_halts_the_simulator() {
        let program = Program::from_arm_words(0, &[0xEE00_0000]);
        let mut simulator = Simulator::new(program, SimulatorConfig::default());

        simulator.step().unwrap_err();
        assert_eq!(
            simulator.state(),
            ExecutionState::Halted(HaltReason::Failed)
        );

        // The failed instruction is not refetched: the next step is a
        // halted no-op, not a second error.
        let state = simulator.step().unwrap();
        assert_eq!(state, ExecutionState::Halted(HaltReason::Failed));
        assert_eq!(simulator.cycles(), 0);
    }

    #[test]
    fn branch_to_the_fall_through_address_counts_as_taken() {
        // B with offset field 0xFFFFFF targets pc + 8 - 4 = pc + 4,
        // exactly where sequential flow would land anyway.
        let program = Program::from_arm_words(0, &[0xEAFF_FFFF, ARM_RETURN]);
        let mut simulator = Simulator::new(program, SimulatorConfig::default());
        let summary = simulator.run().unwrap();

        assert_eq!(summary.cycles, 2);
        // The PC write is detected by value inequality against the old
        // PC, so both the branch and the return count as taken.
        assert_eq!(summary.branches_taken, 2);
        assert_eq!(summary.halt, HaltReason::Returned);
    }

    #[test]
    fn branch_to_self_reads_as_sequential_flow() {
        // B with offset field 0xFFFFFE targets its own address. The
        // written PC equals the old PC, so value-equality detection
        // cannot see the branch and advances past it instead of
        // looping.
        let program = Program::from_arm_words(0, &[0xEAFF_FFFE, ARM_RETURN]);
        let mut simulator = Simulator::new(program, SimulatorConfig::default());
        let summary = simulator.run().unwrap();

        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.branches_taken, 1); // only MOV PC, LR
        assert_eq!(summary.halt, HaltReason::Returned);
    }

    #[test]
    fn halted_simulator_stays_halted() {
        let program = Program::from_arm_words(0, &[ARM_RETURN]);
        let mut simulator = Simulator::new(program, SimulatorConfig::default());
        simulator.run().unwrap();

        let state = simulator.step().unwrap();
        assert_eq!(state, ExecutionState::Halted(HaltReason::Returned));
        assert_eq!(simulator.cycles(), 1);
    }
}
