//! Parser for Reti programs.
//!
//! Syntax:
//! ```text
//! # Comment
//! LOADI ACC 5;    # load immediate
//! ADDI ACC 3;     # ACC := ACC + 3
//! JUMP 0;         # terminate
//! ```
//!
//! Parsing runs in stages: the source is first reduced to line-numbered
//! instruction strings, then each mnemonic is looked up in the opcode
//! table, then the arguments are resolved against the entry's argument
//! kinds.

use crate::cpu::isa::{ArgKind, Argument, InstructionSet, Op, Opcode};
use crate::cpu::registers::{Limits, LimitsError, Register};
use serde::{Serialize, Deserialize};
use std::num::IntErrorKind;
use thiserror::Error;

/// Parser options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Every instruction line must end with `terminator`.
    pub require_terminator: bool,
    /// Match opcodes and registers case-sensitively.
    pub case_sensitive: bool,
    pub comment_marker: char,
    pub terminator: char,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            require_terminator: true,
            case_sensitive: false,
            comment_marker: '#',
            terminator: ';',
        }
    }
}

/// One parsed instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// 1-based source line.
    pub line: usize,
    /// Source text without comment and terminator.
    pub text: String,
    /// Canonical mnemonic from the opcode table.
    pub mnemonic: &'static str,
    /// Resolved operation and arguments.
    pub op: Op,
}

/// A parsed program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Instruction set the program was parsed against.
    pub isa: InstructionSet,
    pub instructions: Vec<Instruction>,
    /// Raw source lines, for display.
    pub source: Vec<String>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Instruction at a program counter value.
    pub fn get(&self, pc: i64) -> Option<&Instruction> {
        usize::try_from(pc).ok().and_then(|pc| self.instructions.get(pc))
    }
}

/// A source line that survived comment and blank-line filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub line: usize,
    pub text: String,
}

/// Parse a program with the given instruction set and options.
///
/// Fails with [`ParseError::InvalidLimits`] when `limits` does not pass
/// [`Limits::validate`].
pub fn parse_program(
    source: &str,
    isa: InstructionSet,
    config: ParserConfig,
    limits: Limits,
) -> Result<Program, ParseError> {
    Parser::new(isa, config, limits).parse(source)
}

/// The parser state.
#[derive(Debug, Clone, Copy)]
pub struct Parser {
    isa: InstructionSet,
    config: ParserConfig,
    limits: Limits,
}

impl Parser {
    pub fn new(isa: InstructionSet, config: ParserConfig, limits: Limits) -> Self {
        Self { isa, config, limits }
    }

    pub fn parse(&self, source: &str) -> Result<Program, ParseError> {
        self.limits.validate()?;
        let lines = self.read_lines(source)?;
        let resolved = self.resolve_opcodes(&lines)?;
        let instructions = self.resolve_arguments(&resolved)?;
        tracing::debug!(instructions = instructions.len(), isa = self.isa.name(), "program parsed");

        Ok(Program {
            isa: self.isa,
            instructions,
            source: source.lines().map(String::from).collect(),
        })
    }

    /// Strip comments, blank lines and terminators.
    pub fn read_lines(&self, source: &str) -> Result<Vec<SourceLine>, ParseError> {
        let marker = self.config.comment_marker;
        let terminator = self.config.terminator;
        let mut lines = Vec::new();

        for (idx, raw) in source.lines().enumerate() {
            let line_num = idx + 1;
            let line = raw.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with(marker) {
                continue;
            }

            // Remove inline comments
            let line = match line.find(marker) {
                Some(idx) => line[..idx].trim(),
                None => line,
            };

            if self.config.require_terminator && !line.ends_with(terminator) {
                return Err(ParseError::MissingTerminator {
                    line: line_num,
                    text: line.to_string(),
                    terminator,
                });
            }

            let stripped = line.trim_end_matches(terminator).trim_end();
            if stripped.is_empty() {
                return Err(ParseError::EmptyInstruction {
                    line: line_num,
                    text: line.to_string(),
                });
            }

            lines.push(SourceLine {
                line: line_num,
                text: stripped.to_string(),
            });
        }

        if lines.is_empty() {
            return Err(ParseError::EmptyProgram);
        }
        Ok(lines)
    }

    /// Look up the mnemonic of every line.
    pub fn resolve_opcodes<'a>(
        &self,
        lines: &'a [SourceLine],
    ) -> Result<Vec<(&'a SourceLine, &'static Opcode)>, ParseError> {
        lines
            .iter()
            .map(|line| {
                let mnemonic = line.text.split_whitespace().next().unwrap_or_default();
                self.isa
                    .opcode(mnemonic, self.config.case_sensitive)
                    .map(|opcode| (line, opcode))
                    .ok_or_else(|| ParseError::UnknownOpcode {
                        line: line.line,
                        text: line.text.clone(),
                        opcode: mnemonic.to_string(),
                        case_sensitive: self.config.case_sensitive,
                        valid: self.isa.opcode_names(),
                    })
            })
            .collect()
    }

    /// Resolve the arguments of every line against its opcode.
    pub fn resolve_arguments(
        &self,
        resolved: &[(&SourceLine, &'static Opcode)],
    ) -> Result<Vec<Instruction>, ParseError> {
        resolved
            .iter()
            .map(|&(line, opcode)| self.resolve_instruction(line, opcode))
            .collect()
    }

    fn resolve_instruction(&self, line: &SourceLine, opcode: &'static Opcode) -> Result<Instruction, ParseError> {
        let tokens: Vec<&str> = line.text.split_whitespace().skip(1).collect();
        let arity_error = || ParseError::ArityMismatch {
            line: line.line,
            text: line.text.clone(),
            expected: opcode.args.len(),
            got: tokens.len(),
            kinds: kind_list(opcode.args),
        };

        if tokens.len() != opcode.args.len() {
            return Err(arity_error());
        }

        let args = tokens
            .iter()
            .zip(opcode.args)
            .map(|(token, kind)| match kind {
                ArgKind::Register => self.register(token, line, opcode).map(Argument::Register),
                ArgKind::Integer => self.integer(token, line).map(Argument::Immediate),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let op = opcode.kind.bind(&args).ok_or_else(arity_error)?;
        Ok(Instruction {
            line: line.line,
            text: line.text.clone(),
            mnemonic: opcode.name,
            op,
        })
    }

    fn register(&self, token: &str, line: &SourceLine, opcode: &Opcode) -> Result<Register, ParseError> {
        self.isa
            .register(token, self.config.case_sensitive)
            .ok_or_else(|| ParseError::UnknownRegister {
                line: line.line,
                text: line.text.clone(),
                token: token.to_string(),
                opcode: opcode.name,
                case_sensitive: self.config.case_sensitive,
                valid: self.isa.register_names(),
            })
    }

    fn integer(&self, token: &str, line: &SourceLine) -> Result<i64, ParseError> {
        let out_of_range = || ParseError::ImmediateOutOfRange {
            line: line.line,
            text: line.text.clone(),
            token: token.to_string(),
            min: self.limits.immediate_min(),
            max: self.limits.immediate_max(),
        };

        let value = match token.parse::<i64>() {
            Ok(value) => value,
            Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                return Err(out_of_range());
            }
            Err(_) => {
                return Err(ParseError::NotAnInteger {
                    line: line.line,
                    text: line.text.clone(),
                    token: token.to_string(),
                });
            }
        };

        if !(self.limits.immediate_min()..=self.limits.immediate_max()).contains(&value) {
            return Err(out_of_range());
        }
        Ok(value)
    }
}

fn kind_list(kinds: &[ArgKind]) -> String {
    kinds.iter().map(ArgKind::to_string).collect::<Vec<_>>().join(", ")
}

fn case_note(case_sensitive: &bool) -> &'static str {
    if *case_sensitive {
        "Matching is case sensitive; this can be disabled."
    } else {
        "Matching is not case sensitive, so this is not an upper/lower case error."
    }
}

/// Errors that can occur while parsing a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing '{terminator}' on line {line}: '{text}'. Every instruction must end with '{terminator}'; this check can be disabled.")]
    MissingTerminator { line: usize, text: String, terminator: char },

    #[error("line {line} contains no instruction: '{text}'")]
    EmptyInstruction { line: usize, text: String },

    #[error("the program contains no instructions")]
    EmptyProgram,

    #[error("'{opcode}' is not a valid command (line {line}: '{text}'). {}\nValid commands: {valid}", case_note(.case_sensitive))]
    UnknownOpcode {
        line: usize,
        text: String,
        opcode: String,
        case_sensitive: bool,
        valid: String,
    },

    #[error("expected {expected} arguments but got {got} on line {line}: '{text}'. The required arguments are: ({kinds})")]
    ArityMismatch {
        line: usize,
        text: String,
        expected: usize,
        got: usize,
        kinds: String,
    },

    #[error("expected one of the registers [{valid}] for '{opcode}' but got '{token}' on line {line}: '{text}'. {}", case_note(.case_sensitive))]
    UnknownRegister {
        line: usize,
        text: String,
        token: String,
        opcode: &'static str,
        case_sensitive: bool,
        valid: String,
    },

    #[error("expected an integer but got '{token}' on line {line}: '{text}'")]
    NotAnInteger { line: usize, text: String, token: String },

    #[error("expected an integer in [{min}, {max}] but got {token} on line {line}: '{text}'")]
    ImmediateOutOfRange {
        line: usize,
        text: String,
        token: String,
        min: i64,
        max: i64,
    },

    #[error("invalid machine limits: {0}")]
    InvalidLimits(#[from] LimitsError),
}

impl ParseError {
    /// Source line the error refers to.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::EmptyProgram | ParseError::InvalidLimits(_) => None,
            ParseError::MissingTerminator { line, .. }
            | ParseError::EmptyInstruction { line, .. }
            | ParseError::UnknownOpcode { line, .. }
            | ParseError::ArityMismatch { line, .. }
            | ParseError::UnknownRegister { line, .. }
            | ParseError::NotAnInteger { line, .. }
            | ParseError::ImmediateOutOfRange { line, .. } => Some(*line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::isa::{Addressing, AluFunc, Condition, Operand};

    fn parse(source: &str) -> Result<Program, ParseError> {
        parse_program(source, InstructionSet::Extended, ParserConfig::default(), Limits::default())
    }

    fn parse_with(source: &str, isa: InstructionSet, config: ParserConfig) -> Result<Program, ParseError> {
        parse_program(source, isa, config, Limits::default())
    }

    #[test]
    fn test_parse_simple() {
        let program = parse("LOADI ACC 5;\nADDI ACC 3;\nJUMP 0;\n").unwrap();
        assert_eq!(program.len(), 3);
        assert_eq!(program.instructions[0].op, Op::LoadImmediate { dst: Register::Acc, value: 5 });
        assert_eq!(
            program.instructions[1].op,
            Op::Alu { func: AluFunc::Add, dst: Register::Acc, operand: Operand::Immediate(3) }
        );
        assert!(program.instructions[2].op.is_terminator());
        assert_eq!(program.instructions[2].line, 3);
        assert_eq!(program.instructions[2].text, "JUMP 0");
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let source = "# header\n\n   # indented comment\nLOAD ACC 4; # trailing\n\nJUMP 0;";
        let program = parse(source).unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program.instructions[0].line, 4);
        assert_eq!(program.instructions[0].text, "LOAD ACC 4");
        assert_eq!(program.instructions[1].line, 6);
        assert_eq!(program.source.len(), 6);
    }

    #[test]
    fn test_missing_terminator() {
        let err = parse("LOADI ACC 1;\nNOP\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingTerminator { line: 2, text: "NOP".into(), terminator: ';' }
        );
    }

    #[test]
    fn test_terminator_optional() {
        let config = ParserConfig { require_terminator: false, ..ParserConfig::default() };
        let program = parse_with("NOP\nJUMP 0;", InstructionSet::Extended, config).unwrap();
        assert_eq!(program.instructions[0].text, "NOP");
        assert_eq!(program.instructions[1].text, "JUMP 0");
    }

    #[test]
    fn test_empty_program() {
        assert_eq!(parse("").unwrap_err(), ParseError::EmptyProgram);
        assert_eq!(parse("# only\n\n  # comments\n").unwrap_err(), ParseError::EmptyProgram);
    }

    #[test]
    fn test_empty_instruction() {
        let err = parse("NOP;\n  ; # nothing").unwrap_err();
        assert!(matches!(err, ParseError::EmptyInstruction { line: 2, .. }));
    }

    #[test]
    fn test_unknown_opcode() {
        let err = parse("LOADI ACC 1;\nFOO ACC;").unwrap_err();
        match &err {
            ParseError::UnknownOpcode { line, text, opcode, valid, .. } => {
                assert_eq!(*line, 2);
                assert_eq!(text, "FOO ACC");
                assert_eq!(opcode, "FOO");
                assert!(valid.contains("LOADIN"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("FOO ACC"));
    }

    #[test]
    fn test_case_sensitivity() {
        let program = parse("loadi acc 1;\njump 0;").unwrap();
        assert_eq!(program.instructions[0].mnemonic, "LOADI");

        let strict = ParserConfig { case_sensitive: true, ..ParserConfig::default() };
        let err = parse_with("loadi ACC 1;", InstructionSet::Extended, strict).unwrap_err();
        assert!(matches!(err, ParseError::UnknownOpcode { .. }));

        let err = parse_with("LOADI acc 1;", InstructionSet::Extended, strict).unwrap_err();
        assert!(matches!(err, ParseError::UnknownRegister { .. }));
    }

    #[test]
    fn test_arity_mismatch() {
        let err = parse("ADD ACC;").unwrap_err();
        assert_eq!(
            err,
            ParseError::ArityMismatch {
                line: 1,
                text: "ADD ACC".into(),
                expected: 2,
                got: 1,
                kinds: "register, integer".into(),
            }
        );
        let msg = err.to_string();
        assert!(msg.contains("line 1"));
        assert!(msg.contains("register, integer"));

        assert!(matches!(parse("NOP 1;"), Err(ParseError::ArityMismatch { expected: 0, got: 1, .. })));
    }

    #[test]
    fn test_unknown_register() {
        let err = parse_with("LOAD SP 1;", InstructionSet::Minimal, ParserConfig::default()).unwrap_err();
        match err {
            ParseError::UnknownRegister { token, valid, .. } => {
                assert_eq!(token, "SP");
                assert_eq!(valid, "ACC, IN1, IN2, PC");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_integers() {
        assert!(matches!(parse("LOADI ACC five;"), Err(ParseError::NotAnInteger { .. })));
        assert!(matches!(parse("LOADI ACC 1.5;"), Err(ParseError::NotAnInteger { .. })));
        assert!(parse("LOADI ACC 2097151;").is_ok());
        assert!(parse("LOADI ACC -2097152;").is_ok());
        assert!(matches!(
            parse("LOADI ACC 2097152;"),
            Err(ParseError::ImmediateOutOfRange { min: -2097152, max: 2097151, .. })
        ));
        assert!(matches!(
            parse("LOADI ACC 99999999999999999999999;"),
            Err(ParseError::ImmediateOutOfRange { .. })
        ));
    }

    #[test]
    fn test_register_argument_order() {
        let program = parse("LOADIN SP ACC 2;\nSTOREIN BAF IN1 -1;\nMOVE ACC IN2;").unwrap();
        assert_eq!(
            program.instructions[0].op,
            Op::Load { mode: Addressing::Indexed(Register::Sp), dst: Register::Acc, offset: 2 }
        );
        assert_eq!(
            program.instructions[1].op,
            Op::Store { mode: Addressing::Indexed(Register::Baf), src: Register::In1, offset: -1 }
        );
        assert_eq!(program.instructions[2].op, Op::Move { src: Register::Acc, dst: Register::In2 });
    }

    #[test]
    fn test_minimal_store() {
        let program = parse_with("STORE 7;", InstructionSet::Minimal, ParserConfig::default()).unwrap();
        assert_eq!(
            program.instructions[0].op,
            Op::Store { mode: Addressing::Direct, src: Register::Acc, offset: 7 }
        );
        assert!(matches!(
            parse_with("STORE ACC 7;", InstructionSet::Minimal, ParserConfig::default()),
            Err(ParseError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_conditional_jumps() {
        let program = parse("JUMP<= -2;\nJUMP!= 3;").unwrap();
        assert_eq!(program.instructions[0].op, Op::Jump { cond: Condition::Le, offset: -2 });
        assert_eq!(program.instructions[1].op, Op::Jump { cond: Condition::Ne, offset: 3 });
    }

    #[test]
    fn test_custom_markers() {
        let config = ParserConfig { comment_marker: '%', terminator: '.', ..ParserConfig::default() };
        let program = parse_with("% c\nNOP. % x\nJUMP 0.", InstructionSet::Extended, config).unwrap();
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_rejects_invalid_limits() {
        let limits = Limits { immediate_bits: 0, ..Limits::default() };
        let err = parse_program("LOADI ACC 1;", InstructionSet::Extended, ParserConfig::default(), limits).unwrap_err();
        assert_eq!(err, ParseError::InvalidLimits(LimitsError { field: "immediate_bits", bits: 0, max: 63 }));
        assert_eq!(err.line(), None);
    }

    #[test]
    fn test_error_line() {
        assert_eq!(parse("NOP;\nJUMP 0;\nFOO;").unwrap_err().line(), Some(3));
        assert_eq!(parse("NOP;\nLOADI ACC x;").unwrap_err().line(), Some(2));
        assert_eq!(parse("# nothing").unwrap_err().line(), None);
    }

    #[test]
    fn test_program_records_isa() {
        assert_eq!(parse("NOP;").unwrap().isa, InstructionSet::Extended);
        let program = parse_with("NOP;", InstructionSet::Minimal, ParserConfig::default()).unwrap();
        assert_eq!(program.isa, InstructionSet::Minimal);
    }

    #[test]
    fn test_program_get() {
        let program = parse("NOP;\nJUMP 0;").unwrap();
        assert!(program.get(-1).is_none());
        assert_eq!(program.get(1).map(|i| i.line), Some(2));
        assert!(program.get(2).is_none());
    }
}
