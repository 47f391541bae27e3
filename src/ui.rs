use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Context, Line as CanvasLine, Rectangle},
        Block, Borders, Clear, Paragraph, Wrap,
    },
    Frame,
};
use skyrchitect_core::{now_ms, DiagramDocument, ResourceKind, Size};
use skyrchitect_editor::view::GRID_SIZE;

use crate::app::{App, Mode, NODE_KINDS};

/// Canvas units covered by one terminal cell at zoom 1
pub const CELL_WIDTH: f64 = 10.0;
pub const CELL_HEIGHT: f64 = 20.0;

/// Render the entire UI
pub fn render(frame: &mut Frame, app: &App) {
    let fullscreen = app.editor.view().fullscreen;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Canvas area (+ side panel)
            Constraint::Length(1), // Status bar
            Constraint::Length(if fullscreen { 0 } else { 1 }), // Help bar
        ])
        .split(frame.area());

    let canvas_area = if fullscreen {
        chunks[0]
    } else {
        let horizontal = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(36)])
            .split(chunks[0]);
        render_side_panel(frame, app, horizontal[1]);
        horizontal[0]
    };

    render_canvas(frame, app, canvas_area);
    render_status_bar(frame, app, chunks[1]);
    if !fullscreen {
        render_help_bar(frame, app, chunks[2]);
    }

    match &app.mode {
        Mode::RecoveryPrompt => render_recovery_prompt(frame, app, canvas_area),
        Mode::LabelInput { text, .. } => render_label_input(frame, text, canvas_area),
        Mode::Help => render_shortcut_help(frame, app, canvas_area),
        Mode::Normal => {}
    }
}

/// Viewport size in canvas units for a terminal area
pub fn viewport_for(area: Rect) -> Size {
    Size::new(f64::from(area.width) * CELL_WIDTH, f64::from(area.height) * CELL_HEIGHT)
}

fn kind_color(kind: ResourceKind) -> Color {
    match kind {
        ResourceKind::Compute => Color::Yellow,
        ResourceKind::Storage => Color::Green,
        ResourceKind::Database => Color::Blue,
        ResourceKind::Network => Color::Cyan,
        ResourceKind::Security => Color::Red,
        ResourceKind::Serverless => Color::Magenta,
        ResourceKind::Analytics => Color::LightBlue,
        ResourceKind::Ml => Color::LightMagenta,
        ResourceKind::Container => Color::LightCyan,
    }
}

/// Diagram drawing. Canvas y grows upwards, diagram y grows downwards, so
/// y coordinates are negated.
fn render_canvas(frame: &mut Frame, app: &App, area: Rect) {
    let view = app.editor.view();
    let doc = app.editor.document();
    let visible_w = view.viewport.width / view.zoom;
    let visible_h = view.viewport.height / view.zoom;
    let (left, top) = (view.pan.x, view.pan.y);

    let title = format!(" {} v{} ", doc.name, doc.version);
    let canvas = Canvas::default()
        .block(Block::default().title(title).borders(Borders::ALL))
        .marker(Marker::Braille)
        .x_bounds([left, left + visible_w])
        .y_bounds([-(top + visible_h), -top])
        .paint(|ctx| {
            if view.show_grid {
                paint_grid(ctx, left, top, visible_w, visible_h);
                ctx.layer();
            }
            paint_diagram(ctx, app, doc);
        });
    frame.render_widget(canvas, area);
}

fn paint_grid(ctx: &mut Context, left: f64, top: f64, width: f64, height: f64) {
    // a line every 5 grid cells keeps braille output readable
    let step = GRID_SIZE * 5.0;
    let mut x = (left / step).ceil() * step;
    while x <= left + width {
        ctx.draw(&CanvasLine::new(x, -top, x, -(top + height), Color::DarkGray));
        x += step;
    }
    let mut y = (top / step).ceil() * step;
    while y <= top + height {
        ctx.draw(&CanvasLine::new(left, -y, left + width, -y, Color::DarkGray));
        y += step;
    }
}

fn paint_diagram(ctx: &mut Context, app: &App, doc: &DiagramDocument) {
    let graph = &doc.graph;
    for edge in &graph.edges {
        let (Some(source), Some(target)) = (graph.node(edge.source), graph.node(edge.target)) else {
            continue;
        };
        let (sx, sy) = (
            source.position.x + source.size.width / 2.0,
            source.position.y + source.size.height / 2.0,
        );
        let (tx, ty) = (
            target.position.x + target.size.width / 2.0,
            target.position.y + target.size.height / 2.0,
        );
        ctx.draw(&CanvasLine::new(sx, -sy, tx, -ty, Color::Gray));
    }

    for node in &graph.nodes {
        let selected = app.editor.selection().contains(node.id);
        let color = if selected { Color::White } else { kind_color(node.kind) };
        ctx.draw(&Rectangle {
            x: node.position.x,
            y: -(node.position.y + node.size.height),
            width: node.size.width,
            height: node.size.height,
            color,
        });
        let style = if selected {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(kind_color(node.kind))
        };
        ctx.print(
            node.position.x + 4.0,
            -(node.position.y + node.size.height / 2.0),
            Span::styled(node.label.clone(), style),
        );
    }
}

fn render_side_panel(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let doc = app.editor.document();
    let cursor = app.cursor_node();
    let nodes: Vec<Line> = doc
        .nodes()
        .iter()
        .map(|node| {
            let marker = if app.editor.selection().contains(node.id) { "●" } else { " " };
            let style = if Some(node.id) == cursor {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(kind_color(node.kind))
            };
            Line::styled(
                format!(
                    "{marker} {} [{} {}] ({:.0},{:.0})",
                    node.label,
                    node.provider.name(),
                    node.kind.name(),
                    node.position.x,
                    node.position.y
                ),
                style,
            )
        })
        .collect();
    frame.render_widget(
        Paragraph::new(nodes).block(Block::default().title(" Components ").borders(Borders::ALL)),
        chunks[0],
    );

    let label_of = |id| doc.graph.node(id).map(|n| n.label.as_str()).unwrap_or("?");
    let edges: Vec<Line> = doc
        .edges()
        .iter()
        .map(|edge| {
            Line::raw(format!(
                "{} → {} ({})",
                label_of(edge.source),
                label_of(edge.target),
                edge.label.as_deref().unwrap_or(edge.kind.name())
            ))
        })
        .collect();
    frame.render_widget(
        Paragraph::new(edges).block(Block::default().title(" Connections ").borders(Borders::ALL)),
        chunks[1],
    );
}

/// "saved 12s ago" style age
fn describe_age(saved_at: u64, now: u64) -> String {
    let secs = now.saturating_sub(saved_at) / 1000;
    match secs {
        0..=4 => "saved just now".to_string(),
        5..=59 => format!("saved {secs}s ago"),
        60..=3599 => format!("saved {}m ago", secs / 60),
        _ => format!("saved {}h ago", secs / 3600),
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (mode_name, mode_bg) = match &app.mode {
        Mode::Normal => ("EDIT", Color::Blue),
        Mode::LabelInput { .. } => ("INS", Color::Green),
        Mode::RecoveryPrompt => ("RECOVER", Color::Red),
        Mode::Help => ("HELP", Color::Cyan),
    };
    let mode_style = Style::default()
        .fg(Color::Black)
        .bg(mode_bg)
        .add_modifier(Modifier::BOLD);

    let status = app.autosave_status();
    let (save_text, save_style) = if status.saving {
        ("saving…".to_string(), Style::default().fg(Color::Yellow))
    } else if let Some(error) = &status.last_error {
        (format!("save failed: {error}"), Style::default().fg(Color::Red))
    } else if status.has_unsaved_changes {
        ("● unsaved".to_string(), Style::default().fg(Color::Yellow))
    } else if let Some(saved_at) = status.last_saved_at {
        (describe_age(saved_at, now_ms()), Style::default().fg(Color::Green))
    } else {
        (String::new(), Style::default())
    };

    let view = app.editor.view();
    let flags = format!(
        " {:.0}%{}{}",
        view.zoom * 100.0,
        if view.show_grid { " grid" } else { "" },
        if view.snap_to_grid { " snap" } else { "" },
    );
    let message = app
        .status_message
        .as_ref()
        .map(|m| format!(" {m}"))
        .unwrap_or_default();

    let spans = vec![
        Span::styled(format!(" {mode_name} "), mode_style),
        Span::raw(format!(" {} ", app.user())),
        Span::styled(save_text, save_style),
        Span::raw(flags),
        Span::raw(format!(" new:{}", NODE_KINDS[app.next_kind].name())),
        Span::raw(message),
    ];
    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(paragraph, area);
}

fn render_help_bar(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = match &app.mode {
        Mode::Normal => "[n]ew [k]ind [Tab] select [Space] extend [e] connect [Enter] rename | ^Z/^⇧Z undo/redo ^S save | [?] keys [q]uit",
        Mode::LabelInput { .. } => "type label | [Enter] confirm [Esc] cancel [Backspace] delete",
        Mode::RecoveryPrompt => "[r] recover [d] discard [q] quit",
        Mode::Help => "any key to close",
    };
    let paragraph = Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn render_recovery_prompt(frame: &mut Frame, app: &App, area: Rect) {
    let Some(snapshot) = app.recovery.as_ref().and_then(|r| r.recovery_data()) else {
        return;
    };
    let document = &snapshot.document;
    let lines = vec![
        Line::from(Span::styled(
            "Unsaved work from a previous session was found.",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
        Line::raw(format!("  {}", document.name)),
        Line::raw(format!(
            "  {} components, {} connections, version {}",
            document.nodes().len(),
            document.edges().len(),
            snapshot.version
        )),
        Line::raw(format!("  {}", describe_age(snapshot.saved_at, now_ms()))),
        Line::raw(""),
        Line::raw("[r] recover it    [d] discard it"),
    ];

    let popup = centered(area, 56, lines.len() as u16 + 2);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(" Recover architecture? ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .style(Style::default().bg(Color::Black)),
        popup,
    );
}

fn render_label_input(frame: &mut Frame, text: &str, area: Rect) {
    let popup = centered(area, 40, 3);
    frame.render_widget(Clear, popup);
    let line = Line::from(vec![
        Span::styled(text.to_string(), Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::styled("▏", Style::default().fg(Color::Yellow).add_modifier(Modifier::SLOW_BLINK)),
    ]);
    frame.render_widget(
        Paragraph::new(line).block(
            Block::default()
                .title(" Label ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green)),
        ),
        popup,
    );
}

fn render_shortcut_help(frame: &mut Frame, app: &App, area: Rect) {
    let bindings = app.dispatcher.registry().bindings();
    let lines: Vec<Line> = bindings
        .iter()
        .map(|b| {
            Line::from(vec![
                Span::styled(format!(" {:<16}", b.chord.to_string()), Style::default().fg(Color::Cyan)),
                Span::raw(b.description.clone()),
            ])
        })
        .collect();
    let popup = centered(area, 60, lines.len() as u16 + 2);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines)
            .block(Block::default().title(" Keyboard shortcuts ").borders(Borders::ALL))
            .style(Style::default().bg(Color::Black)),
        popup,
    );
}
