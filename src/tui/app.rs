//! Debugger application state and logic.

use crate::cpu::{InstructionSet, Register};
use crate::debugger::{AutoStep, Debugger, Radix, StepReport};
use crossterm::event::KeyCode;
use std::time::Instant;

/// Debugger application state.
pub struct DebuggerApp {
    /// The execution controller.
    pub debugger: Debugger,
    /// Should we quit?
    pub should_quit: bool,
    /// Message of the last action.
    pub status: String,
    /// Debug message of the last step, if enabled.
    pub debug: Option<String>,
    /// Memory view scroll offset.
    pub mem_scroll: usize,
    /// Pending edit command, `None` outside edit mode.
    pub input: Option<String>,
    /// When the next auto-step is due.
    next_tick: Option<Instant>,
}

impl DebuggerApp {
    pub fn new(debugger: Debugger, status: String) -> Self {
        Self {
            debugger,
            should_quit: false,
            status,
            debug: None,
            mem_scroll: 0,
            input: None,
            next_tick: None,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        let report = self.debugger.step();
        self.show(report);
    }

    /// Revert the last step.
    pub fn undo(&mut self) {
        self.set_auto(AutoStep::Off);
        let report = self.debugger.undo();
        self.show(report);
    }

    fn show(&mut self, report: StepReport) {
        self.next_tick = report.next_delay.map(|delay| Instant::now() + delay);
        self.status = report.message;
        self.debug = report.debug;
    }

    /// Start or stop auto-stepping. A new mode steps right away.
    pub fn set_auto(&mut self, mode: AutoStep) {
        self.debugger.set_auto_step(mode);
        self.next_tick = match mode {
            AutoStep::Off => None,
            _ if self.debugger.is_terminated() => None,
            _ => Some(Instant::now()),
        };
    }

    pub fn toggle_debug(&mut self) {
        self.debugger.show_debug = !self.debugger.show_debug;
        self.status = if self.debugger.show_debug {
            "Debug messages enabled.".into()
        } else {
            "Debug messages disabled.".into()
        };
    }

    /// Run one iteration of auto-stepping.
    pub fn tick(&mut self, now: Instant) {
        if matches!(self.next_tick, Some(due) if now >= due) {
            self.step();
        }
    }

    pub fn is_auto_stepping(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Stored cells shown in a memory pane of `rows` rows.
    pub fn memory_page(&self, rows: usize) -> Vec<(u64, i64)> {
        let mem = self.debugger.memory();
        // Undo can drop cells below the scroll offset
        let offset = self.mem_scroll.min(mem.len().saturating_sub(1));
        match mem.iter().nth(offset) {
            Some((start, _)) => mem.dump(start, rows),
            None => Vec::new(),
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        if let Some(input) = self.input.as_mut() {
            match code {
                KeyCode::Enter => {
                    let command = std::mem::take(input);
                    self.input = None;
                    self.status = match self.apply_command(&command) {
                        Ok(msg) | Err(msg) => msg,
                    };
                }
                KeyCode::Esc => self.input = None,
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) => input.push(c),
                _ => {}
            }
            return;
        }

        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('s') => {
                self.set_auto(AutoStep::Off);
                self.step();
            }
            KeyCode::Char('u') => self.undo(),
            KeyCode::Char('a') => self.set_auto(AutoStep::Slow),
            KeyCode::Char('f') => self.set_auto(AutoStep::Fast),
            KeyCode::Char('p') => {
                self.set_auto(AutoStep::Off);
                self.status = "Paused.".into();
            }
            KeyCode::Char('d') => self.toggle_debug(),
            KeyCode::Char('e') => {
                self.set_auto(AutoStep::Off);
                self.input = Some(String::new());
            }
            KeyCode::Up => self.mem_scroll = self.mem_scroll.saturating_sub(1),
            KeyCode::Down => {
                if self.mem_scroll + 1 < self.debugger.memory().len() {
                    self.mem_scroll += 1;
                }
            }
            _ => {}
        }
    }

    /// Apply an edit command.
    ///
    /// `REG VALUE` sets a register, `M ADDR VALUE` a memory cell. A value
    /// prefixed with `0b` is read as two's complement binary.
    pub fn apply_command(&mut self, command: &str) -> Result<String, String> {
        let tokens: Vec<&str> = command.split_whitespace().collect();
        match tokens.as_slice() {
            [m, addr, value] if m.eq_ignore_ascii_case("m") => {
                let (input, radix) = split_radix(value);
                let (addr, value) = self
                    .debugger
                    .inject_memory(addr, input, radix)
                    .map_err(|e| e.to_string())?;
                Ok(format!("Memory cell {} set to {}.", addr, value))
            }
            [name, value] => {
                let reg = self.register(name)?;
                let (input, radix) = split_radix(value);
                let value = self
                    .debugger
                    .inject_register(reg, input, radix)
                    .map_err(|e| e.to_string())?;
                Ok(format!("Register {} set to {}.", reg, value))
            }
            _ => Err(format!("Unknown edit command '{}'. Use 'REG VALUE' or 'M ADDR VALUE'.", command.trim())),
        }
    }

    fn register(&self, name: &str) -> Result<Register, String> {
        let isa: InstructionSet = self.debugger.cpu().isa;
        isa.register(name, false)
            .ok_or_else(|| format!("Unknown register '{}'. Valid registers: {}", name, isa.register_names()))
    }
}

fn split_radix(value: &str) -> (&str, Radix) {
    match value.strip_prefix("0b") {
        Some(bits) => (bits, Radix::Binary),
        None => (value, Radix::Decimal),
    }
}

/// Run the debugger until the user quits.
pub fn run_debugger(debugger: Debugger, status: String) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
        previous_hook(info);
    }));
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(debugger, status);

    // Main loop
    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        app.tick(Instant::now());

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
