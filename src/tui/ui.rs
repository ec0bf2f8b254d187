//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem, Wrap},
    style::{Color, Style, Modifier},
};
use crate::cpu::{format_binary, Register};
use crate::debugger::RunState;
use super::app::DebuggerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: source and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(10),
        ])
        .split(chunks[0]);

    draw_source(frame, left_chunks[0], app);
    draw_status(frame, left_chunks[1], app);

    // Right side: registers, memory and help
    let register_rows = app.debugger.cpu().isa.registers().len() as u16 + 2;
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(register_rows),
            Constraint::Min(6),
            Constraint::Length(5),
        ])
        .split(chunks[1]);

    draw_registers(frame, right_chunks[0], app);
    draw_memory(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2], app);
}

/// Draw program source with the next instruction highlighted.
fn draw_source(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let source = &app.debugger.program().source;
    let current = app.debugger.current_line();
    let visible = (area.height as usize).saturating_sub(2);
    let start = current
        .map(|line| line.saturating_sub(visible / 2 + 1))
        .unwrap_or(0)
        .min(source.len().saturating_sub(visible));

    let items: Vec<ListItem> = source
        .iter()
        .enumerate()
        .skip(start)
        .take(visible)
        .map(|(idx, text)| {
            let line = idx + 1;
            let is_current = current == Some(line);
            let prefix = if is_current { "▶ " } else { "  " };
            let style = if is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{}{:>3}: {}", prefix, line, text)).style(style)
        })
        .collect();

    let state = match app.debugger.state() {
        RunState::Running => "running",
        RunState::AwaitingStep => "paused",
        RunState::Terminated => "terminated",
    };
    let title = format!(" {} | {} | undo: {} ", app.debugger.cpu().isa.name(), state, app.debugger.history_depth());

    let list = List::new(items)
        .block(Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw registers in decimal and binary.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let cpu = app.debugger.cpu();
    let bits = cpu.limits.register_bits;

    let content: Vec<Line> = cpu
        .isa
        .registers()
        .iter()
        .map(|&reg| {
            let value = cpu.regs.get(reg);
            let color = if reg == Register::Pc { Color::Yellow } else { Color::White };
            Line::from(vec![
                Span::raw(format!("{:<4}", reg.name())),
                Span::styled(format!("{:>12}", value), Style::default().fg(color)),
                Span::styled(format!("  {}", format_binary(value, bits)), Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw the non-empty memory cells.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let cpu = app.debugger.cpu();

    let items: Vec<ListItem> = app
        .memory_page(visible_rows)
        .into_iter()
        .map(|(addr, value)| {
            let text = format!("{:>10}: {:>12}  {}", addr, value, format_binary(value, cpu.limits.cell_bits));
            let style = if value != 0 {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            ListItem::new(text).style(style)
        })
        .collect();

    let title = if cpu.mem.is_empty() {
        " Memory (empty, all cells read 0) ".to_string()
    } else {
        format!(" Memory ({} cells) ", cpu.mem.len())
    };

    let list = List::new(items)
        .block(Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status panel, or the edit prompt.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    if let Some(input) = &app.input {
        let prompt = Paragraph::new(format!("> {}_", input))
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default()
                .title(" Edit: REG VALUE | M ADDR VALUE | 0b prefix for binary | Esc cancels ")
                .borders(Borders::ALL));
        frame.render_widget(prompt, area);
        return;
    }

    let mut lines: Vec<Line> = app.status.lines().map(|l| Line::from(l.to_string())).collect();
    if let Some(debug) = &app.debug {
        lines.push(Line::styled(debug.clone(), Style::default().fg(Color::Yellow)));
    }

    let status = Paragraph::new(lines)
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false })
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let debug = if app.debugger.show_debug { "on" } else { "off" };
    let help = Paragraph::new(vec![
        Line::from("s: Step  u: Undo  a: Auto (slow)  f: Auto (fast)  p: Pause"),
        Line::from(format!("e: Edit value  d: Debug messages ({})  ↑↓: Scroll memory", debug)),
        Line::from("q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
