//! Property tests for machine state, rollback and undo.

use proptest::prelude::*;
use reti::cpu::Register;
use reti::{parse_program, Cpu, Debugger, InstructionSet, Limits, Memory, Outcome, ParserConfig, Registers};
use std::collections::BTreeMap;

fn debugger(source: &str, mem: Memory) -> Debugger {
    let limits = Limits::default();
    let program = parse_program(source, InstructionSet::Extended, ParserConfig::default(), limits).unwrap();
    Debugger::new(program, Cpu::with_memory(InstructionSet::Extended, limits, mem)).unwrap()
}

fn register() -> impl Strategy<Value = Register> {
    prop::sample::select(Register::ALL.to_vec())
}

fn memory() -> impl Strategy<Value = Memory> {
    prop::collection::btree_map(0u64..1024, i32::MIN as i64..=i32::MAX as i64, 0..16).prop_map(Memory::from_cells)
}

/// Instructions that always fail when IN1 and IN2 are zero.
const FAILING: [&str; 6] = [
    "DIVI ACC 0",
    "MODR ACC IN2",
    "LOADIN1 ACC -1",
    "STOREIN2 ACC -5",
    "JUMP -1",
    "LOADI PC -3",
];

/// Instructions that never fail for small operands.
fn safe_instruction() -> impl Strategy<Value = String> {
    (0usize..6, -1000i64..1000, 0u64..64).prop_map(|(kind, imm, addr)| match kind {
        0 => format!("ADDI ACC {}", imm),
        1 => format!("SUBI IN1 {}", imm),
        2 => format!("STORE ACC {}", addr),
        3 => format!("LOAD IN2 {}", addr),
        4 => format!("OPLUSI SP {}", imm),
        _ => "MOVE ACC DS".to_string(),
    })
}

proptest! {
    #[test]
    fn register_round_trip(reg in register(), value in i32::MIN as i64..=i32::MAX as i64) {
        let mut regs = Registers::new();
        regs.set(reg, value);
        prop_assert_eq!(regs.get(reg), value);
        for other in Register::ALL.iter().filter(|&&r| r != reg) {
            prop_assert_eq!(regs.get(*other), 0);
        }
    }

    #[test]
    fn register_injection_round_trip(reg in register(), value in i32::MIN as i64..=i32::MAX as i64) {
        prop_assume!(reg != Register::Pc);
        let mut dbg = debugger("JUMP 0;", Memory::new());
        prop_assert!(dbg.set_register(reg, value).is_ok());
        prop_assert_eq!(dbg.registers().get(reg), value);
    }

    #[test]
    fn unwritten_memory_reads_zero(mem in memory(), addr in 0u64..4096) {
        let written: BTreeMap<u64, i64> = mem.iter().collect();
        prop_assume!(!written.contains_key(&addr));
        prop_assert_eq!(mem.read(addr), 0);
    }

    #[test]
    fn failed_step_leaves_state_unchanged(
        mem in memory(),
        acc in i32::MIN as i64..=i32::MAX as i64,
        which in 0..FAILING.len(),
    ) {
        let source = format!("{};\nJUMP 0;", FAILING[which]);
        let mut dbg = debugger(&source, mem);
        dbg.set_register(Register::Acc, acc).unwrap();
        let before = dbg.cpu().snapshot();

        let report = dbg.step();
        prop_assert!(matches!(report.outcome, Outcome::Failed(_)), "{}", report.message);
        prop_assert_eq!(dbg.cpu().snapshot(), before);
        prop_assert_eq!(dbg.history_depth(), 0);
        prop_assert!(!dbg.is_terminated());
    }

    #[test]
    fn undo_restores_initial_state(
        mem in memory(),
        body in prop::collection::vec(safe_instruction(), 1..24),
    ) {
        let source = body.iter().map(|line| format!("{};\n", line)).collect::<String>() + "JUMP 0;";
        let mut dbg = debugger(&source, mem);
        let initial = dbg.cpu().snapshot();

        let mut steps = 0;
        while !dbg.is_terminated() {
            let report = dbg.step();
            prop_assert!(!matches!(report.outcome, Outcome::Failed(_)), "{}", report.message);
            steps += 1;
        }
        prop_assert_eq!(steps, body.len() + 1);
        prop_assert_eq!(dbg.history_depth(), steps);

        for _ in 0..steps {
            prop_assert_eq!(dbg.undo().outcome, Outcome::Reverted);
        }
        prop_assert_eq!(dbg.cpu().snapshot(), initial.clone());
        prop_assert_eq!(dbg.undo().outcome, Outcome::NothingToUndo);
        prop_assert_eq!(dbg.cpu().snapshot(), initial);
    }
}
