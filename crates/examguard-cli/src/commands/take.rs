//! The `examguard take` command.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use examguard_core::host::{FocusSignal, HostPage};
use examguard_core::model::{SessionPhase, TestDefinition};
use examguard_core::notification::{NotificationChannel, NotificationLevel};
use examguard_core::report::SessionReport;
use examguard_core::session::{Collaborators, ExamSession, SessionEvent};
use examguard_core::timer::format_clock;
use examguard_core::traits::QuestionSource;
use examguard_host::config::load_config_from;
use examguard_host::{create_devices, create_source, DeviceMode, FileSource, JsonResultStore};
use examguard_report::html::write_html_report;

/// Terminal focus-out report (`CSI O`), sent while focus reporting is on.
const FOCUS_OUT: &str = "\x1b[O";
/// Terminal focus-in report (`CSI I`).
const FOCUS_IN: &str = "\x1b[I";

/// Turns terminal focus reporting on for its lifetime.
struct FocusReporting {
    enabled: bool,
}

impl FocusReporting {
    fn enable() -> Self {
        let enabled = std::io::stdin().is_terminal() && std::io::stdout().is_terminal();
        if enabled {
            print!("\x1b[?1004h");
        }
        Self { enabled }
    }
}

impl Drop for FocusReporting {
    fn drop(&mut self) {
        if self.enabled {
            print!("\x1b[?1004l");
        }
    }
}

/// Prints each notification once, in order.
struct NotificationPrinter {
    notifier: NotificationChannel,
    last_seq: u64,
}

impl NotificationPrinter {
    fn new(notifier: NotificationChannel) -> Self {
        Self {
            notifier,
            last_seq: 0,
        }
    }

    fn flush(&mut self) {
        if let Some(n) = self.notifier.current() {
            if n.seq > self.last_seq {
                self.last_seq = n.seq;
                let tag = match n.level {
                    NotificationLevel::Info => "info",
                    NotificationLevel::Warning => "WARNING",
                    NotificationLevel::Error => "ERROR",
                };
                println!("[{tag}] {}", n.message);
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Select(usize),
    Next,
    Prev,
    Goto(usize),
    Show,
    Time,
    Status,
    Submit,
    Help,
    Empty,
    Unknown(String),
}

fn parse_command(input: &str) -> Command {
    let input = input.trim();
    let mut parts = input.split_whitespace();
    let Some(word) = parts.next() else {
        return Command::Empty;
    };
    if let Ok(n) = word.parse::<usize>() {
        return match n {
            0 => Command::Unknown(input.to_string()),
            n => Command::Select(n - 1),
        };
    }
    match word.to_ascii_lowercase().as_str() {
        "next" | "n" => Command::Next,
        "prev" | "p" => Command::Prev,
        "goto" | "g" => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n > 0 => Command::Goto(n - 1),
            _ => Command::Unknown(input.to_string()),
        },
        "show" | "q" => Command::Show,
        "time" | "t" => Command::Time,
        "status" | "s" => Command::Status,
        "submit" => Command::Submit,
        "help" | "h" | "?" => Command::Help,
        _ => Command::Unknown(input.to_string()),
    }
}

/// Ctrl-C presses, registered once so none is lost between polls.
struct Interrupts {
    #[cfg(unix)]
    inner: tokio::signal::unix::Signal,
    #[cfg(windows)]
    inner: tokio::signal::windows::CtrlC,
}

impl Interrupts {
    fn listen() -> Result<Self> {
        #[cfg(unix)]
        let inner =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
                .context("failed to listen for Ctrl-C")?;
        #[cfg(windows)]
        let inner = tokio::signal::windows::ctrl_c().context("failed to listen for Ctrl-C")?;
        Ok(Self { inner })
    }

    async fn recv(&mut self) -> Option<()> {
        self.inner.recv().await
    }
}

/// Turn focus reports embedded in an input line into host signals.
/// Returns the line with the reports removed and the number of focus losses
/// that reached a listener.
fn extract_focus_reports(line: &str, host: &HostPage) -> (String, usize) {
    let mut rest = line;
    let mut cleaned = String::with_capacity(line.len());
    let mut delivered = 0;
    loop {
        let next_out = rest.find(FOCUS_OUT);
        let next_in = rest.find(FOCUS_IN);
        let (pos, signal, len) = match (next_out, next_in) {
            (Some(o), Some(i)) if i < o => (i, FocusSignal::WindowFocus, FOCUS_IN.len()),
            (Some(o), _) => (o, FocusSignal::WindowBlur, FOCUS_OUT.len()),
            (None, Some(i)) => (i, FocusSignal::WindowFocus, FOCUS_IN.len()),
            (None, None) => break,
        };
        cleaned.push_str(&rest[..pos]);
        if host.emit(signal) > 0 && signal == FocusSignal::WindowBlur {
            delivered += 1;
        }
        rest = &rest[pos + len..];
    }
    cleaned.push_str(rest);
    (cleaned, delivered)
}

fn print_rules(test: &TestDefinition, violation_limit: u32) {
    println!("{}", test.title);
    println!("Topic: {}", test.topic);
    println!("Questions: {}", test.questions.len());
    println!("Duration: {} minutes", test.duration_minutes);
    println!();
    println!("Rules:");
    println!("  - You have {} minutes to complete the test.", test.duration_minutes);
    println!("  - Each correct answer earns {} marks.", test.correct_marks);
    println!("  - Each incorrect answer deducts {} marks.", test.negative_marks);
    println!("  - Unanswered questions score nothing.");
    println!(
        "  - Do not leave the test window. The test is submitted automatically after {violation_limit} attempts."
    );
    println!("  - Camera and microphone access are required.");
    println!();
}

fn print_help() {
    println!("Commands:");
    println!("  1..n       select an option for the current question");
    println!("  next, n    next question");
    println!("  prev, p    previous question");
    println!("  goto N     jump to question N");
    println!("  show       show the current question again");
    println!("  time       time remaining");
    println!("  status     answered questions and violations");
    println!("  submit     submit the test");
}

fn print_question(session: &ExamSession) {
    let Some(question) = session.current_question() else {
        println!("This test has no questions. Type 'submit' to finish.");
        return;
    };
    let selected = session.answers().get(&question.id);
    println!();
    println!(
        "Question {} of {}  ({} left)",
        session.current_index() + 1,
        session.question_count(),
        format_clock(session.remaining_secs())
    );
    println!("{}", question.prompt);
    for (i, option) in question.options.iter().enumerate() {
        let mark = if selected == Some(option.text.as_str()) {
            "*"
        } else {
            " "
        };
        println!(" {mark} {}) {}", i + 1, option.text);
    }
}

fn print_status(session: &ExamSession) {
    let total = session.question_count();
    let answered = session.answers().len();
    println!(
        "Answered {answered} of {total}; {} left; {} violation(s).",
        format_clock(session.remaining_secs()),
        session.violations()
    );
}

pub async fn execute(
    questions: Option<PathBuf>,
    config_path: Option<PathBuf>,
    results: Option<PathBuf>,
    devices: Option<DeviceMode>,
    html: Option<PathBuf>,
    json: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    let source: Box<dyn QuestionSource> = match questions {
        Some(path) => Box::new(FileSource::new(path)),
        None => create_source(&config.source),
    };
    let devices = create_devices(devices.unwrap_or(config.devices));
    let results_path = results.unwrap_or_else(|| config.results_path.clone());
    let store = Arc::new(JsonResultStore::new(&results_path));
    let host = HostPage::new();
    let notifier = NotificationChannel::with_ttl(Duration::from_secs(config.notification_secs));
    let mut printer = NotificationPrinter::new(notifier.clone());

    let (session, mut events) = ExamSession::new(Collaborators {
        devices,
        sink: store,
        host: host.clone(),
        notifier,
    });
    let mut session = session.with_violation_limit(config.violation_limit);

    eprintln!("Loading test from {}", source.name());
    let loaded = session.load_from(source.as_ref()).await;
    printer.flush();
    if !loaded {
        anyhow::bail!("could not load the test from {}", source.name());
    }
    if let Some(test) = session.definition() {
        print_rules(test, config.violation_limit);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Waiting room: start, retrying after a refused permission.
    loop {
        println!("Type 'start' to begin the test or 'quit' to leave.");
        let Some(line) = lines.next_line().await.context("failed to read input")? else {
            println!("Test not started.");
            return Ok(());
        };
        match line.trim().to_ascii_lowercase().as_str() {
            "start" => {
                let phase = session.start().await?;
                printer.flush();
                if phase == SessionPhase::Running {
                    break;
                }
            }
            "quit" | "exit" => {
                println!("Test not started.");
                return Ok(());
            }
            "" => {}
            other => println!("Unknown command: {other}"),
        }
    }

    let _focus = FocusReporting::enable();
    println!("Test started. Type 'help' for commands.");
    print_question(&session);

    let mut interrupts = Interrupts::listen()?;
    let mut interrupt_count = 0u32;
    while session.phase() == SessionPhase::Running {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("failed to read input")? {
                    Some(line) => {
                        let (line, mut pending) = extract_focus_reports(&line, &host);
                        // Focus losses on this line count before its command runs.
                        while pending > 0 && session.phase() == SessionPhase::Running {
                            let Some(event) = events.recv().await else {
                                break;
                            };
                            if matches!(event, SessionEvent::Violation { .. }) {
                                pending -= 1;
                            }
                            session.handle_event(event).await?;
                            printer.flush();
                        }
                        printer.flush();
                        if session.phase() != SessionPhase::Running {
                            break;
                        }
                        run_command(&mut session, parse_command(&line)).await?;
                    }
                    None => {
                        println!("End of input; submitting the test.");
                        session.submit().await?;
                    }
                }
            }
            Some(event) = events.recv() => {
                session.handle_event(event).await?;
                if let SessionEvent::Tick { remaining_secs: 60 | 10, .. } = event {
                    println!("{} remaining.", format_clock(session.remaining_secs()));
                }
            }
            Some(()) = interrupts.recv() => {
                interrupt_count += 1;
                if interrupt_count == 1 && host.leave_warning_enabled() {
                    println!("Leaving now abandons the test without a result. Press Ctrl-C again to leave.");
                } else {
                    println!("Test abandoned. No result was recorded.");
                    return Ok(());
                }
            }
        }
        printer.flush();
    }

    let report =
        SessionReport::from_session(&session).context("session ended without a result")?;
    println!();
    print!("{}", report.to_text());

    if let Some(path) = html {
        write_html_report(&report, &path)?;
        eprintln!("HTML report: {}", path.display());
    }
    if let Some(path) = json {
        report.save_json(&path)?;
        eprintln!("JSON report: {}", path.display());
    }
    if report.persisted {
        eprintln!("Result saved to: {}", results_path.display());
    }

    Ok(())
}

async fn run_command(session: &mut ExamSession, command: Command) -> Result<()> {
    match command {
        Command::Select(index) => match session.select_current(index) {
            Ok(()) => print_question(session),
            Err(e) => println!("{e}"),
        },
        Command::Next => {
            session.navigate(1)?;
            print_question(session);
        }
        Command::Prev => {
            session.navigate(-1)?;
            print_question(session);
        }
        Command::Goto(index) => {
            session.go_to(index)?;
            print_question(session);
        }
        Command::Show => print_question(session),
        Command::Time => println!("{} left.", format_clock(session.remaining_secs())),
        Command::Status => print_status(session),
        Command::Submit => {
            session.submit().await?;
        }
        Command::Help => print_help(),
        Command::Empty => {}
        Command::Unknown(input) => println!("Unknown command: {input} (type 'help')"),
    }
    Ok(())
}
