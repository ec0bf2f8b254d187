//! End-to-end runs of Reti programs through the parser and controller.

use reti::asm::parse_memory;
use reti::cpu::Register;
use reti::{
    parse_program, Cpu, CpuError, Debugger, InstructionSet, Limits, Outcome, ParseError, ParserConfig, RunState,
    Termination,
};

fn load(source: &str, isa: InstructionSet, memory: &str) -> Debugger {
    let limits = Limits::default();
    let program = parse_program(source, isa, ParserConfig::default(), limits).unwrap();
    let mem = parse_memory(memory, &limits).unwrap();
    Debugger::new(program, Cpu::with_memory(isa, limits, mem)).unwrap()
}

fn run_to_end(dbg: &mut Debugger) -> usize {
    let mut steps = 0;
    while !dbg.is_terminated() {
        let report = dbg.step();
        assert!(!matches!(report.outcome, Outcome::Failed(_)), "{}", report.message);
        steps += 1;
        assert!(steps < 1000, "program does not terminate");
    }
    steps
}

#[test]
fn test_load_add_terminate() {
    let mut dbg = load("LOADI ACC 5;\nADDI ACC 3;\nJUMP 0;", InstructionSet::Extended, "{}");

    dbg.step();
    assert_eq!((dbg.registers().acc(), dbg.registers().pc()), (5, 1));
    dbg.step();
    assert_eq!((dbg.registers().acc(), dbg.registers().pc()), (8, 2));

    let report = dbg.step();
    assert!(report.terminal);
    assert_eq!(report.outcome, Outcome::Terminated(Termination::Sentinel { line: 3 }));
    assert!(report.message.contains("line 3"));
    assert_eq!(dbg.registers().acc(), 8);
}

#[test]
fn test_division_program() {
    let source = "LOADI ACC 10;\nDIVI ACC 3;\nSTORE ACC 0;\nLOADI ACC -10;\nDIVI ACC 3;\nJUMP 0;";
    let mut dbg = load(source, InstructionSet::Extended, "{}");
    run_to_end(&mut dbg);
    assert_eq!(dbg.memory().read(0), 3);
    assert_eq!(dbg.registers().acc(), -3);
}

#[test]
fn test_countdown_loop() {
    let source = "\
# count ACC down to zero
LOADI ACC 3;
SUBI ACC 1;     # loop body
JUMP> -1;
JUMP 0;
";
    let mut dbg = load(source, InstructionSet::Extended, "{}");
    let steps = run_to_end(&mut dbg);
    assert_eq!(steps, 8);
    assert_eq!(dbg.registers().acc(), 0);
    assert_eq!(dbg.history_depth(), 8);
}

#[test]
fn test_minimal_machine_with_memory_file() {
    // M[0] + M[1] into M[2], then copy through an IN1 offset
    let source = "\
LOAD ACC 0;
ADD ACC 1;
STORE 2;
LOADI IN1 10;
STOREIN1 5;
JUMP 0;
";
    let mut dbg = load(source, InstructionSet::Minimal, r#"{ "0": 50, "1": -8 }"#);
    run_to_end(&mut dbg);
    assert_eq!(dbg.memory().read(2), 42);
    assert_eq!(dbg.memory().read(15), 42);
    assert_eq!(dbg.memory().read(3), 0);
}

#[test]
fn test_extended_indirect_access() {
    let source = "\
LOADI SP 100;
LOADI ACC 7;
STOREIN SP ACC 2;
LOADIN SP BAF 2;
MULI BAF 6;
JUMP 0;
";
    let mut dbg = load(source, InstructionSet::Extended, "{}");
    run_to_end(&mut dbg);
    assert_eq!(dbg.memory().read(102), 7);
    assert_eq!(dbg.registers().get(Register::Baf), 42);
}

#[test]
fn test_runtime_error_is_retryable() {
    let source = "LOADI IN1 0;\nDIV ACC 4;\nJUMP 0;";
    let mut dbg = load(source, InstructionSet::Extended, "{}");
    dbg.step();

    let report = dbg.step();
    assert!(matches!(report.outcome, Outcome::Failed(CpuError::DivisionByZero { .. })));
    assert!(report.message.contains("line 2"));
    assert_eq!(dbg.state(), RunState::AwaitingStep);
    assert_eq!(dbg.registers().pc(), 1);

    // Fix the divisor and retry
    dbg.set_memory(4, 2).unwrap();
    dbg.set_register(Register::Acc, 9).unwrap();
    assert_eq!(dbg.step().outcome, Outcome::Executed);
    assert_eq!(dbg.registers().acc(), 4);
}

#[test]
fn test_overflow_names_register() {
    let source = "LOADI ACC 1048575;\nMULI ACC 2048;\nMULI ACC 2048;\nJUMP 0;";
    let mut dbg = load(source, InstructionSet::Extended, "{}");
    dbg.step();
    dbg.step();
    let report = dbg.step();
    match report.outcome {
        Outcome::Failed(CpuError::RegisterOverflow { register, .. }) => assert_eq!(register, Register::Acc),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(dbg.registers().acc(), 1048575_i64 * 2048);
}

#[test]
fn test_missing_terminator_instruction() {
    let mut dbg = load("LOADI ACC 1;\nADDI ACC 1;", InstructionSet::Minimal, "{}");
    dbg.step();
    let report = dbg.step();
    assert_eq!(report.outcome, Outcome::Terminated(Termination::EndOfProgram));
    assert!(report.message.contains("JUMP 0"));

    // Undo brings back the last instruction
    dbg.undo();
    assert_eq!(dbg.current_line(), Some(2));
}

#[test]
fn test_pc_injection_to_end() {
    let mut dbg = load("NOP;\nJUMP 0;", InstructionSet::Extended, "{}");
    dbg.set_register(Register::Pc, 2).unwrap();
    let report = dbg.step();
    assert_eq!(report.outcome, Outcome::Terminated(Termination::EndOfProgram));
    assert_eq!(dbg.history_depth(), 0);
}

#[test]
fn test_parse_rejects_short_add() {
    let err = parse_program(
        "LOADI ACC 1;\nADD ACC;",
        InstructionSet::Extended,
        ParserConfig::default(),
        Limits::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ParseError::ArityMismatch { line: 2, .. }));
    let message = err.to_string();
    assert!(message.contains("ADD ACC"));
    assert!(message.contains("register, integer"));
}

#[test]
fn test_minimal_rejects_extended_opcodes() {
    for source in ["MULI ACC 2;", "LOADI SP 1;", "STORE ACC 1;"] {
        assert!(
            parse_program(source, InstructionSet::Minimal, ParserConfig::default(), Limits::default()).is_err(),
            "{} should not parse",
            source
        );
    }
}
