//! Execution controller for Reti programs.
//!
//! Drives the fetch-execute loop one instruction at a time, keeps a stack
//! of machine snapshots for undo and detects program termination. Every
//! call returns a [`StepReport`] that holds everything a display needs.

pub mod inject;

use crate::asm::{Instruction, Program};
use crate::cpu::{Cpu, CpuError, InstructionSet, Memory, PcUpdate, Registers, Snapshot};
use serde::{Serialize, Deserialize};
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

pub use inject::{InjectError, Radix, Target};

/// Controller state between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Auto-step is active; the caller should keep stepping.
    Running,
    /// Idle, waiting for the next step.
    AwaitingStep,
    /// No further steps are executed until a step is undone.
    Terminated,
}

/// Caller-driven auto-repeat of [`Debugger::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AutoStep {
    #[default]
    Off,
    /// One step per second.
    Slow,
    /// One step every 50 ms.
    Fast,
}

impl AutoStep {
    pub const fn delay(self) -> Option<Duration> {
        match self {
            AutoStep::Off => None,
            AutoStep::Slow => Some(Duration::from_millis(1000)),
            AutoStep::Fast => Some(Duration::from_millis(50)),
        }
    }
}

/// Why the program stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The terminate instruction (`JUMP 0`) was executed on `line`.
    Sentinel { line: usize },
    /// The program counter ran past the last instruction.
    EndOfProgram,
}

/// What a step or undo call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Executed,
    Terminated(Termination),
    /// The instruction failed and its effects were rolled back.
    Failed(CpuError),
    AlreadyTerminated,
    Reverted,
    NothingToUndo,
}

/// Result of one [`Debugger::step`] or [`Debugger::undo`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub outcome: Outcome,
    /// Always shown.
    pub message: String,
    /// Only present when debug messages are enabled.
    pub debug: Option<String>,
    pub terminal: bool,
    /// How long to wait before suggesting the next step.
    pub next_delay: Option<Duration>,
}

/// The execution controller.
#[derive(Debug, Clone)]
pub struct Debugger {
    cpu: Cpu,
    program: Program,
    history: Vec<Snapshot>,
    state: RunState,
    auto_step: AutoStep,
    /// Include debug-only messages in reports.
    pub show_debug: bool,
}

/// A program handed to a machine of the other instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the program was parsed for {} but the machine runs {}", .program.name(), .machine.name())]
pub struct IsaMismatch {
    pub program: InstructionSet,
    pub machine: InstructionSet,
}

impl Debugger {
    /// Create a controller for `program`, starting from the state in `cpu`.
    ///
    /// The program must have been parsed for the instruction set of `cpu`.
    pub fn new(program: Program, mut cpu: Cpu) -> Result<Self, IsaMismatch> {
        if program.isa != cpu.isa {
            return Err(IsaMismatch { program: program.isa, machine: cpu.isa });
        }
        cpu.max_pc = program.len();
        Ok(Self {
            cpu,
            program,
            history: Vec::new(),
            state: RunState::AwaitingStep,
            auto_step: AutoStep::Off,
            show_debug: false,
        })
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn registers(&self) -> &Registers {
        &self.cpu.regs
    }

    pub fn memory(&self) -> &Memory {
        &self.cpu.mem
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == RunState::Terminated
    }

    /// Number of snapshots available for undo.
    pub fn history_depth(&self) -> usize {
        self.history.len()
    }

    pub fn auto_step(&self) -> AutoStep {
        self.auto_step
    }

    pub fn set_auto_step(&mut self, mode: AutoStep) {
        self.auto_step = mode;
        if self.state != RunState::Terminated {
            self.state = self.idle_state();
        }
    }

    /// The instruction the next step executes.
    pub fn next_instruction(&self) -> Option<&Instruction> {
        if self.is_terminated() {
            return None;
        }
        self.program.get(self.cpu.regs.pc())
    }

    /// Source line of the next instruction, for highlighting.
    pub fn current_line(&self) -> Option<usize> {
        self.next_instruction().map(|instr| instr.line)
    }

    /// Execute the instruction at the program counter.
    pub fn step(&mut self) -> StepReport {
        if self.is_terminated() {
            return self.report(
                Outcome::AlreadyTerminated,
                "The program has terminated. Undo a step to continue.".into(),
                None,
            );
        }

        let pc = self.cpu.regs.pc();
        let Some(instruction) = self.program.get(pc).cloned() else {
            return self.terminate_at_end(String::new(), None);
        };

        self.history.push(self.cpu.snapshot());
        tracing::trace!(depth = self.history.len(), "snapshot pushed");
        tracing::debug!(pc, line = instruction.line, text = %instruction.text, "step");

        match self.cpu.execute(&instruction.op) {
            Ok(update) => self.complete(&instruction, update),
            Err(err) => self.roll_back(&instruction, err),
        }
    }

    fn complete(&mut self, instruction: &Instruction, update: PcUpdate) -> StepReport {
        if update == PcUpdate::Advance {
            self.cpu.regs.advance_pc();
        }

        let mut message = format!("Executed '{}' (line {}).", instruction.text, instruction.line);
        if let Some(info) = self.cpu.take_message() {
            let _ = write!(message, "\n{}", info);
        }
        let debug = self.cpu.take_debug_message();
        let _ = write!(message, "\n{}", self.machine_state());

        if instruction.op.is_terminator() {
            tracing::info!(line = instruction.line, "terminate instruction reached");
            let _ = write!(
                message,
                "\nTerminate instruction '{}' encountered on line {}. The program has finished.",
                instruction.text, instruction.line
            );
            self.state = RunState::Terminated;
            self.auto_step = AutoStep::Off;
            return self.report(
                Outcome::Terminated(Termination::Sentinel { line: instruction.line }),
                message,
                debug,
            );
        }

        if self.cpu.at_end() {
            return self.terminate_at_end(message, debug);
        }

        self.state = self.idle_state();
        self.report(Outcome::Executed, message, debug)
    }

    fn terminate_at_end(&mut self, mut message: String, debug: Option<String>) -> StepReport {
        let last = self.program.instructions.last().map(|i| i.text.as_str()).unwrap_or_default();
        tracing::info!(pc = self.cpu.regs.pc(), "ran past the last instruction");
        if !message.is_empty() {
            message.push('\n');
        }
        let _ = write!(
            message,
            "pc={}, len={}, last='{}'\n\
             Reached the end of the program before a 'JUMP 0' instruction. \
             Add 'JUMP 0' as the last instruction that is executed.",
            self.cpu.regs.pc(),
            self.program.len(),
            last
        );
        self.state = RunState::Terminated;
        self.auto_step = AutoStep::Off;
        self.report(Outcome::Terminated(Termination::EndOfProgram), message, debug)
    }

    fn roll_back(&mut self, instruction: &Instruction, err: CpuError) -> StepReport {
        if let Some(snapshot) = self.history.pop() {
            self.cpu.restore(snapshot);
        }
        tracing::warn!(error = %err, line = instruction.line, "step failed, state rolled back");

        self.auto_step = AutoStep::Off;
        self.state = RunState::AwaitingStep;
        let message = format!(
            "Encountered the following error:\n{}\n\
             This was caught at instruction '{}' on line {}.\n\
             The machine was reverted to the last stable state.",
            err, instruction.text, instruction.line
        );
        self.report(Outcome::Failed(err), message, None)
    }

    /// Revert the most recent step.
    pub fn undo(&mut self) -> StepReport {
        let Some(snapshot) = self.history.pop() else {
            return self.report(Outcome::NothingToUndo, "No steps to revert.".into(), None);
        };
        self.cpu.restore(snapshot);
        tracing::trace!(depth = self.history.len(), "snapshot popped");

        // At least the reverted instruction is pending again.
        self.state = self.idle_state();
        let message = format!("Reverted to the previous step.\n{}", self.machine_state());
        self.report(Outcome::Reverted, message, None)
    }

    /// Register values of the active variant and the non-empty memory cells.
    pub fn machine_state(&self) -> String {
        let registers = self
            .cpu
            .isa
            .registers()
            .iter()
            .map(|&reg| format!("{}={}", reg, self.cpu.regs.get(reg)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Current state of the machine:\nregisters: {}\nmemory: {}",
            registers, self.cpu.mem
        )
    }

    fn idle_state(&self) -> RunState {
        match self.auto_step {
            AutoStep::Off => RunState::AwaitingStep,
            _ => RunState::Running,
        }
    }

    fn report(&self, outcome: Outcome, message: String, debug: Option<String>) -> StepReport {
        let terminal = self.is_terminated();
        StepReport {
            outcome,
            message,
            debug: debug.filter(|_| self.show_debug),
            terminal,
            next_delay: if terminal { None } else { self.auto_step.delay() },
        }
    }
}
