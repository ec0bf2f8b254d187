//! Reti Debugger - CLI Entry Point
//!
//! Commands:
//! - `reti-debug run <program>` - Run a program until it terminates
//! - `reti-debug debug <program>` - Interactive step debugger
//! - `reti-debug check <program>` - Parse and list the instructions
//! - `reti-debug opcodes` - List the opcodes of an instruction set

use clap::{Parser, Subcommand};
use reti::{AutoStep, Config, Cpu, Debugger, InstructionSet, Outcome, Overrides, ParseError, Program};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "reti-debug")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "A step debugger for the Reti register machine")]
struct Cli {
    /// Instruction set to parse and execute with
    #[arg(long, value_enum, global = true)]
    isa: Option<InstructionSet>,
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Allow instruction lines without a trailing ';'
    #[arg(long, global = true)]
    no_terminator: bool,
    /// Match opcodes and registers case-sensitively
    #[arg(long, global = true)]
    case_sensitive: bool,
    /// Show debug messages such as denied jumps
    #[arg(short, long, global = true)]
    debug_messages: bool,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Write log output to a file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it terminates
    Run {
        /// Path to the Reti program
        program: PathBuf,
        /// JSON file with the initial memory
        #[arg(short, long)]
        memory: Option<PathBuf>,
        /// Maximum number of steps to run (default: 10000)
        #[arg(short = 'n', long, default_value = "10000")]
        max_steps: u64,
    },
    /// Interactive step debugger
    Debug {
        /// Path to the Reti program
        program: PathBuf,
        /// JSON file with the initial memory
        #[arg(short, long)]
        memory: Option<PathBuf>,
        /// Start auto-stepping right away
        #[arg(long, value_enum)]
        auto: Option<AutoStep>,
    },
    /// Parse a program and list the resolved instructions
    Check {
        /// Path to the Reti program
        program: PathBuf,
    },
    /// List the opcodes of the instruction set
    Opcodes,
}

fn main() {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, Some(Commands::Debug { .. }));
    init_logging(cli.verbose, cli.log_file.as_deref(), interactive);
    install_panic_hook();

    let auto = match &cli.command {
        Some(Commands::Debug { auto, .. }) => *auto,
        _ => None,
    };
    let config = load_config(&cli, auto);

    match cli.command {
        Some(Commands::Run { program, memory, max_steps }) => {
            run_program(&program, memory.as_deref(), max_steps, &config);
        }
        Some(Commands::Debug { program, memory, .. }) => {
            debug_program(&program, memory.as_deref(), &config);
        }
        Some(Commands::Check { program }) => {
            check_program(&program, &config);
        }
        Some(Commands::Opcodes) => {
            list_opcodes(config.isa);
        }
        None => {
            println!("Reti Debugger v0.1.0");
            println!("A step debugger for the Reti register machine");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>, interactive: bool) {
    use tracing_subscriber::EnvFilter;

    // Log lines on stderr would tear the TUI apart.
    let default = match (verbose, interactive && log_file.is_none()) {
        (_, true) => "off",
        (true, false) => "debug",
        (false, false) => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file.map(std::fs::File::create) {
        Some(Ok(file)) => builder.with_ansi(false).with_writer(std::sync::Mutex::new(file)).init(),
        Some(Err(e)) => fail(&format!("Failed to open log file: {}", e)),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(%info, "internal error");
        default_hook(info);
        eprintln!();
        eprintln!("💥 The debugger hit an internal error. This is a bug, please report it");
        eprintln!("   together with the program and memory file that triggered it.");
        std::process::exit(1);
    }));
}

fn fail(message: &str) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

fn load_config(cli: &Cli, auto_step: Option<AutoStep>) -> Config {
    let config = match &cli.config {
        Some(path) => Config::load(path).unwrap_or_else(|e| fail(&e.to_string())),
        None => Config::default(),
    };
    config.merge(Overrides {
        isa: cli.isa,
        no_terminator: cli.no_terminator,
        case_sensitive: cli.case_sensitive,
        debug_messages: cli.debug_messages,
        auto_step,
    })
}

fn load_program(path: &Path, config: &Config) -> Program {
    let source = std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail(&format!("Failed to read {}: {}", path.display(), e)));

    reti::parse_program(&source, config.isa, config.parser, config.limits)
        .unwrap_or_else(|e| fail(&parse_failure(&e, &source)))
}

/// Error message followed by the offending source line, if there is one.
fn parse_failure(err: &ParseError, source: &str) -> String {
    let mut message = format!("Parse error: {}", err);
    if let Some(line) = err.line() {
        if let Some(text) = source.lines().nth(line - 1) {
            message.push_str(&format!("\n   {:>4} | {}", line, text));
        }
    }
    message
}

fn load_debugger(program_path: &Path, memory_path: Option<&Path>, config: &Config) -> (Debugger, String) {
    let program = load_program(program_path, config);
    let (mem, status) = reti::load_memory(memory_path, &config.limits)
        .unwrap_or_else(|e| fail(&format!("Memory file error: {}", e)));

    let cpu = Cpu::with_memory(config.isa, config.limits, mem);
    let mut debugger = Debugger::new(program, cpu).unwrap_or_else(|e| fail(&e.to_string()));
    debugger.show_debug = config.show_debug;
    debugger.set_auto_step(config.auto_step);
    (debugger, status)
}

fn run_program(path: &Path, memory: Option<&Path>, max_steps: u64, config: &Config) {
    println!("🔧 Running: {}", path.display());

    let (mut debugger, status) = load_debugger(path, memory, config);
    println!("📝 Parsed {} instructions for {}", debugger.program().len(), config.isa.name());
    println!("📂 {}", status);
    println!();

    let mut steps = 0;
    loop {
        if steps >= max_steps {
            println!();
            println!("⚠️  Reached max steps limit ({}). Use --max-steps to increase.", max_steps);
            break;
        }

        let report = debugger.step();
        steps += 1;
        println!("{}", report.message);
        if let Some(debug) = &report.debug {
            println!("🐛 {}", debug);
        }
        println!();

        if let Outcome::Failed(_) = report.outcome {
            fail("Runtime error, stopping.");
        }
        if report.terminal {
            break;
        }
    }

    println!("━━━ Result ━━━");
    println!("Steps: {}", steps);
    println!("State: {:?}", debugger.state());
    println!("{}", debugger.machine_state());
}

fn debug_program(path: &Path, memory: Option<&Path>, config: &Config) {
    let (debugger, status) = load_debugger(path, memory, config);

    #[cfg(feature = "tui")]
    {
        if let Err(e) = reti::run_debugger(debugger, status) {
            fail(&format!("Debugger error: {}", e));
        }
    }

    #[cfg(not(feature = "tui"))]
    {
        let _ = (debugger, status);
        fail("This build has no interactive debugger. Rebuild with --features tui.");
    }
}

fn check_program(path: &Path, config: &Config) {
    println!("📖 Checking: {}", path.display());
    println!();

    let program = load_program(path, config);
    for (pc, instruction) in program.instructions.iter().enumerate() {
        println!(
            "{:03}  line {:>3}  {:<28} {}",
            pc,
            instruction.line,
            instruction.text,
            instruction.op.describe()
        );
    }

    println!();
    let has_terminator = program.instructions.iter().any(|i| i.op.is_terminator());
    println!("✓ {} instructions for {}", program.len(), config.isa.name());
    if !has_terminator {
        println!("⚠️  No 'JUMP 0' instruction. The program can only end by running past its last line.");
    }
}

fn list_opcodes(isa: InstructionSet) {
    println!("━━━ {} ━━━", isa.name());
    println!("Registers: {}", isa.register_names());
    println!();
    for opcode in isa.opcodes() {
        let args = opcode.args.iter().map(|kind| kind.to_string()).collect::<Vec<_>>().join(" ");
        println!("  {:<10} {}", opcode.name, args);
    }
}
