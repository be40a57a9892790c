// SPDX-License-Identifier: GPL-3.0-only

//! Terminal front end
//!
//! Hosts the home menu and both capability screens with ratatui. Input is
//! read on a dedicated thread and forwarded to the async loop, which selects
//! between keys and the open session's events.
//!
//! Long operations (mount, retry, single fix) run under [`Io::drive`], which
//! keeps drawing, shows permission dialogs coming from
//! [`ChannelPermissions`] and lets `Esc` cancel by dropping the operation.

use crate::backends::permission::{
    ChannelPermissions, PromptAnswer, PromptReceiver, PromptRequest, prompt_text,
};
use crate::backends::{self, LocationApi, PermissionApi, PermissionStatus, ScanApi};
use crate::config::{Config, PermissionPolicy};
use crate::constants::{APP_ID, ui::TICK};
use crate::fl;
use crate::presenter::{Notice, PresenterView, ResultPresenter};
use crate::session::{CaptureSession, LocationSession, ScanSession, SessionState};
use crate::shell::ScreenShell;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Clear, Paragraph, Widget, Wrap},
};
use std::future::Future;
use std::io::{self, Stdout, stdout};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type ScanShell = ScreenShell<ScanSession<Box<dyn PermissionApi>, Box<dyn ScanApi>>>;
type LocationShell = ScreenShell<LocationSession<Box<dyn PermissionApi>, Box<dyn LocationApi>>>;

/// Log file used while the terminal UI owns the screen
pub fn log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join(APP_ID).join(format!("{}.log", APP_ID)))
}

/// Run the terminal UI until the user quits
pub async fn run(config: &Config, simulate: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (scan_permissions, location_permissions, prompts) = permissions(config.permission_policy);
    let scanner = backends::create_scanner(config, simulate);
    let locator = backends::create_locator(config, simulate)?;

    let mut screens = Screens {
        current: Screen::Home,
        scan: ScreenShell::new(ScanSession::new(
            scan_permissions,
            scanner,
            config.camera,
            config.scan_options(),
        )),
        location: ScreenShell::new(LocationSession::with_options(
            location_permissions,
            locator,
            config.single_fix,
            config.watch,
        )),
    };

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;

    let (key_tx, keys) = mpsc::unbounded_channel();
    let input = spawn_input(key_tx)?;
    let mut io = Io {
        terminal,
        keys,
        prompts,
    };

    // Run the app
    let result = run_app(&mut io, &mut screens).await;

    // Close sessions before giving the terminal back
    screens.scan.close();
    screens.location.close();

    // Restore terminal
    disable_raw_mode()?;
    execute!(io.terminal.backend_mut(), LeaveAlternateScreen)?;
    io.terminal.show_cursor()?;

    drop(io);
    if input.join().is_err() {
        warn!("Input thread panicked");
    }

    result.map_err(Into::into)
}

/// Permission adapters for both screens plus the dialog queue, if any
fn permissions(
    policy: PermissionPolicy,
) -> (Box<dyn PermissionApi>, Box<dyn PermissionApi>, Option<PromptReceiver>) {
    match policy {
        PermissionPolicy::Prompt => {
            let (channel, prompts) = ChannelPermissions::new();
            (Box::new(channel.clone()), Box::new(channel), Some(prompts))
        }
        policy => (
            backends::create_permissions(policy),
            backends::create_permissions(policy),
            None,
        ),
    }
}

/// Forward terminal events until the receiver goes away
fn spawn_input(sender: mpsc::UnboundedSender<Event>) -> io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("tui-input".into())
        .spawn(move || {
            loop {
                match event::poll(TICK) {
                    Ok(true) => match event::read() {
                        Ok(event) => {
                            if sender.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to read terminal event");
                            break;
                        }
                    },
                    Ok(false) if sender.is_closed() => break,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(error = %e, "Failed to poll terminal events");
                        break;
                    }
                }
            }
            debug!("Input thread exiting");
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    Scan,
    Location,
}

struct Screens {
    current: Screen,
    scan: ScanShell,
    location: LocationShell,
}

enum Flow {
    Continue,
    Quit,
}

struct Io {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    keys: mpsc::UnboundedReceiver<Event>,
    prompts: Option<PromptReceiver>,
}

impl Io {
    /// Run an operation that may prompt for permission
    ///
    /// Returns `None` if the user cancelled with `Esc`; the operation's
    /// future is dropped and the caller restores a consistent state.
    async fn drive<T>(&mut self, operation: impl Future<Output = T>) -> io::Result<Option<T>> {
        let mut operation = std::pin::pin!(operation);
        let mut prompt: Option<PromptRequest> = None;

        loop {
            self.terminal
                .draw(|frame| render_busy(frame, prompt.as_ref()))?;

            tokio::select! {
                output = &mut operation => return Ok(Some(output)),
                Some(request) = next_prompt(&mut self.prompts), if prompt.is_none() => {
                    prompt = Some(request);
                }
                event = self.keys.recv() => {
                    let Some(event) = event else {
                        return Ok(None);
                    };
                    let Some(key) = pressed(&event) else {
                        continue;
                    };
                    match prompt.take() {
                        Some(request) => match prompt_answer(key) {
                            Some(answer) => request.answer(answer),
                            None => prompt = Some(request),
                        },
                        None if key.code == KeyCode::Esc || is_interrupt(key) => {
                            info!("Operation cancelled");
                            return Ok(None);
                        }
                        None => {}
                    }
                }
            }
        }
    }
}

async fn next_prompt(prompts: &mut Option<PromptReceiver>) -> Option<PromptRequest> {
    match prompts {
        Some(receiver) => receiver.recv().await,
        None => futures::future::pending().await,
    }
}

fn pressed(event: &Event) -> Option<KeyEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(*key),
        _ => None,
    }
}

fn is_interrupt(key: KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

fn prompt_answer(key: KeyEvent) -> Option<PromptAnswer> {
    match key.code {
        KeyCode::Char('p') | KeyCode::Char('s') | KeyCode::Char('y') => Some(PromptAnswer::Allow),
        KeyCode::Char('c') | KeyCode::Char('n') => Some(PromptAnswer::Deny),
        KeyCode::Char('d') | KeyCode::Esc => Some(PromptAnswer::Later),
        _ => None,
    }
}

async fn run_app(io: &mut Io, screens: &mut Screens) -> io::Result<()> {
    loop {
        // The scan screen closes itself when its modal is dismissed
        if screens.current == Screen::Scan && !screens.scan.is_visible() {
            screens.current = Screen::Home;
        }

        io.terminal.draw(|frame| render(frame, screens))?;

        tokio::select! {
            event = io.keys.recv() => {
                let Some(event) = event else {
                    return Ok(());
                };
                let Some(key) = pressed(&event) else {
                    continue;
                };
                if let Flow::Quit = handle_key(io, screens, key).await? {
                    return Ok(());
                }
            }
            event = screens.scan.next_event(), if screens.current == Screen::Scan => {
                screens.scan.apply(event);
            }
            event = screens.location.next_event(), if screens.current == Screen::Location => {
                screens.location.apply(event);
            }
        }
    }
}

async fn handle_key(io: &mut Io, screens: &mut Screens, key: KeyEvent) -> io::Result<Flow> {
    if is_interrupt(key) {
        return Ok(Flow::Quit);
    }

    match screens.current {
        Screen::Home => match key.code {
            KeyCode::Char('c') => {
                screens.current = Screen::Scan;
                if io.drive(screens.scan.open()).await?.is_none() {
                    screens.scan.close();
                }
            }
            KeyCode::Char('g') => {
                screens.current = Screen::Location;
                if io.drive(screens.location.open()).await?.is_none() {
                    screens.location.session_mut().stop();
                }
            }
            KeyCode::Char('q') | KeyCode::Esc => return Ok(Flow::Quit),
            _ => {}
        },
        Screen::Scan => {
            let shell = &mut screens.scan;
            if shell.presenter().notice().is_some() {
                if key.code == KeyCode::Enter {
                    shell.dismiss_notice();
                }
                return Ok(Flow::Continue);
            }
            if shell.presenter().is_modal_open() {
                if key.code == KeyCode::Enter {
                    shell.dismiss();
                }
                return Ok(Flow::Continue);
            }
            match key.code {
                KeyCode::Char('s') => {
                    shell.start();
                }
                KeyCode::Char('r') if needs_permission(shell.presenter()) => {
                    io.drive(shell.retry_permission()).await?;
                }
                KeyCode::Char('x') | KeyCode::Esc => {
                    shell.close();
                    screens.current = Screen::Home;
                }
                KeyCode::Char('q') => return Ok(Flow::Quit),
                _ => {}
            }
        }
        Screen::Location => {
            let shell = &mut screens.location;
            if shell.presenter().notice().is_some() {
                if key.code == KeyCode::Enter {
                    shell.dismiss_notice();
                }
                return Ok(Flow::Continue);
            }
            match key.code {
                KeyCode::Char('o') => {
                    if io.drive(shell.locate_once()).await?.is_none() {
                        shell.session_mut().stop();
                    }
                }
                KeyCode::Char('t') => {
                    if shell.is_tracking() {
                        shell.stop_tracking();
                    } else {
                        shell.start_tracking();
                    }
                }
                KeyCode::Char('r') if needs_permission(shell.presenter()) => {
                    let granted = io
                        .drive(shell.retry_permission())
                        .await?
                        .is_some_and(|status| status == PermissionStatus::Granted);
                    if granted && io.drive(shell.locate_once()).await?.is_none() {
                        shell.session_mut().stop();
                    }
                }
                KeyCode::Esc | KeyCode::Char('x') => {
                    shell.close();
                    screens.current = Screen::Home;
                }
                KeyCode::Char('q') => return Ok(Flow::Quit),
                _ => {}
            }
        }
    }

    Ok(Flow::Continue)
}

fn needs_permission(presenter: &ResultPresenter) -> bool {
    matches!(presenter.view(), PresenterView::PermissionMissing { .. })
}

fn render(frame: &mut Frame, screens: &Screens) {
    let [header, body, status] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let hints = match screens.current {
        Screen::Home => {
            render_title(frame, header, fl!("home-title"));
            render_home(frame, body);
            fl!("keys-home")
        }
        Screen::Scan => {
            render_title(frame, header, fl!("home-open-camera"));
            render_scan(frame, body, &screens.scan);
            if screens.scan.presenter().is_modal_open() {
                fl!("keys-modal")
            } else {
                fl!("keys-scan")
            }
        }
        Screen::Location => {
            render_title(frame, header, fl!("location-title"));
            render_location(frame, body, &screens.location);
            fl!("keys-location")
        }
    };

    let notice = match screens.current {
        Screen::Home => None,
        Screen::Scan => screens.scan.presenter().notice(),
        Screen::Location => screens.location.presenter().notice(),
    };
    if let Some(notice) = notice {
        render_notice(frame, body, notice);
    }

    frame.render_widget(StatusBar { message: &hints }, status);
}

fn render_title(frame: &mut Frame, area: Rect, title: String) {
    let style = Style::default().add_modifier(Modifier::BOLD);
    frame.render_widget(Paragraph::new(Line::styled(title, style)).centered(), area);
}

fn render_home(frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(fl!("home-subtitle")),
        Line::default(),
        Line::from(format!("[c] {}", fl!("home-open-camera"))),
        Line::from(format!("[g] {}", fl!("home-open-location"))),
        Line::from(format!("[q] {}", fl!("home-quit"))),
    ];
    frame.render_widget(Paragraph::new(lines).centered(), area);
}

/// Lines shared by both screens for the permission and unavailable views
fn status_lines(view: &PresenterView) -> Option<Vec<Line<'static>>> {
    match view {
        PresenterView::PermissionMissing {
            message, action, ..
        } => Some(vec![
            Line::styled(message.clone(), Style::default().fg(Color::Yellow)),
            Line::default(),
            Line::from(format!("[r] {}", action)),
        ]),
        PresenterView::Unavailable { message } => Some(vec![Line::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        )]),
        _ => None,
    }
}

fn render_scan(frame: &mut Frame, area: Rect, shell: &ScanShell) {
    let presenter = shell.presenter();
    let lines = status_lines(presenter.view()).unwrap_or_else(|| {
        if shell.session().state() == SessionState::Active {
            vec![
                Line::styled(fl!("scan-hint"), Style::default().fg(Color::Cyan)),
                Line::default(),
                Line::from(format!("[x] {}", fl!("scan-close"))),
            ]
        } else {
            vec![
                Line::from(format!("[s] {}", fl!("scan-start"))),
                Line::from(format!("[x] {}", fl!("scan-close"))),
            ]
        }
    });

    let viewfinder = Block::bordered().border_style(Style::default().fg(Color::DarkGray));
    let inner = viewfinder.inner(area);
    frame.render_widget(viewfinder, area);
    let [middle] = Layout::vertical([Constraint::Length(lines.len() as u16)])
        .flex(Flex::Center)
        .areas(inner);
    frame.render_widget(Paragraph::new(lines).centered().wrap(Wrap { trim: true }), middle);

    if let PresenterView::Modal(summary) = presenter.view() {
        let mut lines: Vec<Line> = summary.entries.iter().cloned().map(Line::from).collect();
        lines.push(Line::default());
        lines.push(Line::styled(
            format!("[ {} ]", summary.button),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        let popup = popup_area(area, 70, lines.len() as u16 + 2);
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(summary.title.as_str())),
            popup,
        );
    }
}

fn render_location(frame: &mut Frame, area: Rect, shell: &LocationShell) {
    let mut lines = match shell.presenter().view() {
        PresenterView::Live(readout) => readout.lines().into_iter().map(Line::from).collect(),
        view => status_lines(view).unwrap_or_else(|| vec![Line::from(fl!("location-awaiting"))]),
    };

    lines.push(Line::default());
    lines.push(Line::from(format!("[o] {}", fl!("location-get-position"))));
    let tracking = if shell.is_tracking() {
        fl!("location-stop-tracking")
    } else {
        fl!("location-start-tracking")
    };
    lines.push(Line::from(format!("[t] {}", tracking)));

    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::bordered()),
        area,
    );
}

fn render_notice(frame: &mut Frame, area: Rect, notice: &Notice) {
    let lines = vec![
        Line::from(notice.message.clone()),
        Line::default(),
        Line::styled("[ Enter ]", Style::default().add_modifier(Modifier::BOLD)),
    ];
    let popup = popup_area(area, 60, lines.len() as u16 + 2);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(
                Block::bordered()
                    .title(notice.title.as_str())
                    .border_style(Style::default().fg(Color::Red)),
            ),
        popup,
    );
}

/// Frame drawn while an operation is in flight
fn render_busy(frame: &mut Frame, prompt: Option<&PromptRequest>) {
    let [body, status] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());
    frame.render_widget(Paragraph::new(fl!("location-awaiting")).centered(), body);

    let hints = match prompt {
        Some(request) => {
            let (title, message) = prompt_text(request.capability);
            let lines = vec![
                Line::from(message),
                Line::default(),
                Line::from(format!(
                    "[p] {}   [c] {}   [d] {}",
                    fl!("permission-allow"),
                    fl!("permission-deny"),
                    fl!("permission-later")
                )),
            ];
            let popup = popup_area(body, 70, lines.len() as u16 + 2);
            frame.render_widget(Clear, popup);
            frame.render_widget(
                Paragraph::new(lines)
                    .wrap(Wrap { trim: true })
                    .block(Block::bordered().title(title)),
                popup,
            );
            fl!("keys-prompt")
        }
        None => "'Esc'".to_string(),
    };
    frame.render_widget(StatusBar { message: &hints }, status);
}

fn popup_area(area: Rect, percent_x: u16, height: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        // Hints contain non-ASCII text, so truncate by characters
        let text: String = self.message.chars().take(area.width as usize).collect();

        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}
