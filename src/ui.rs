use crate::app::{Model, View};
use crate::rate::Percent;
use crate::view::{ColorBand, bar, human_bytes, paginate, trim_text};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
};

const METER_WIDTH: u16 = 50;
const CELL_METER_WIDTH: usize = 5;
const NAME_WIDTH: usize = 24;

pub fn draw(f: &mut Frame, model: &mut Model) {
    f.render_widget(Clear, f.area());
    match model.view {
        View::Host => draw_host(f, model),
        View::Processes => draw_processes(f, model),
    }
}

pub fn band_color(band: ColorBand) -> Color {
    match band {
        ColorBand::Low => Color::Green,
        ColorBand::Medium => Color::Yellow,
        ColorBand::High => Color::Red,
    }
}

fn draw_host(f: &mut Frame, model: &Model) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("┌system monitor┐")
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(f.area());
    f.render_widget(block, f.area());

    let width = inner.width.min(METER_WIDTH) as usize;
    let lines = vec![
        Line::from(" q quit  tab processes").style(Style::default().fg(Color::DarkGray)),
        Line::default(),
        Line::from(format!("CPU Usage: {:.2}%", model.cpu.get())),
        meter(model.cpu, width),
        Line::default(),
        Line::from(format!("Memory Usage: {:.2}%", model.memory.get())),
        meter(model.memory, width),
    ];
    f.render_widget(
        Paragraph::new(lines).style(Style::default().fg(Color::White)),
        inner,
    );
}

fn draw_processes(f: &mut Frame, model: &mut Model) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.area());

    draw_table(f, model, root[0]);

    let len = model.processes.len();
    let current = if len == 0 {
        0
    } else {
        model.selection.index() + 1
    };
    let status = format!(
        " cpu {:>5.1}%  ticks {}  sort={}  {current}/{len}  {}ms  q quit  tab host",
        model.cpu.get(),
        model.total_ticks,
        model.metric.label(),
        model.interval.as_millis(),
    );
    f.render_widget(
        Paragraph::new(status).style(Style::default().fg(Color::DarkGray)),
        root[1],
    );
}

fn draw_table(f: &mut Frame, model: &mut Model, area: Rect) {
    // two borders and the header.
    let visible_rows = area.height.saturating_sub(3) as usize;
    model.page_size = visible_rows.max(1);
    model
        .selection
        .align(model.processes.len(), visible_rows);
    let start = model.selection.scroll();
    let selected = model.selection.index();

    let header = Row::new(["Pid", "Cpu%", "Mem", "Name"].into_iter().map(Cell::from)).style(
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let rows = paginate(&model.processes, start, visible_rows)
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let mut row_style = if i % 2 == 0 {
                Style::default().fg(Color::Gray)
            } else {
                Style::default().fg(Color::White)
            };
            if start + i == selected {
                row_style = row_style.add_modifier(Modifier::REVERSED);
            }
            let cpu_style = Style::default().fg(band_color(ColorBand::of(entry.cpu)));
            Row::new(vec![
                Cell::from(entry.sample.pid.to_string()),
                Cell::from(format!(
                    "{} {:>5.1}",
                    bar(entry.cpu, CELL_METER_WIDTH),
                    entry.cpu.get()
                ))
                .style(cpu_style),
                Cell::from(format!("{:>6}", human_bytes(entry.sample.resident_bytes))),
                Cell::from(trim_text(&entry.sample.name, NAME_WIDTH)),
            ])
            .style(row_style)
        });

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(7),
            Constraint::Min(8),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("┌proc┐< {} >", model.metric.label()))
            .border_style(Style::default().fg(Color::Red)),
    );
    f.render_widget(table, area);
}

fn meter(percent: Percent, width: usize) -> Line<'static> {
    let color = band_color(ColorBand::of(percent));
    Line::from(Span::styled(bar(percent, width), Style::default().fg(color)))
}
