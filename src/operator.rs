//! The human supervising a session.
//!
//! Everything the agent shows or asks goes through [`Operator`]; the
//! terminal implementation is [`Console`]. Tests substitute a recording
//! implementation.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use agent_provider::CancelSignal;

use crate::markdown::render_markdown;
use crate::turn::lock_unpoisoned;

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(25);
const SPINNER_INTERVAL: Duration = Duration::from_millis(100);
const SPINNER_FRAMES: [char; 4] = ['|', '/', '-', '\\'];

const RESET: &str = "\x1b[0m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const BOLD_BLUE: &str = "\x1b[1;34m";
const BOLD_MAGENTA: &str = "\x1b[1;35m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GRAY: &str = "\x1b[90m";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorEvent {
    Notice(String),
    /// One-line description of a failure.
    Diagnostic(String),
    Thought(String),
    Reply(String),
    ToolCall(String),
    ProposedEdit {
        path: String,
        diff: String,
        /// Unified diff of the file as it would look after the edit.
        preview: String,
    },
    Summary(String),
}

pub trait Operator: Send + Sync {
    fn emit(&self, event: OperatorEvent);

    /// Asks a y/N question. Anything but "y", a closed input or a cancelled
    /// signal counts as "no".
    fn confirm(&self, prompt: &str, cancel: &CancelSignal) -> bool;

    /// Progress indicator shown while a model request is outstanding.
    fn wait_indicator(&self) -> Option<Spinner> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    Line(String),
    Cancelled,
    Closed,
}

/// Stdin lines delivered through a channel so that a read can be abandoned
/// when its turn is cancelled.
#[derive(Debug)]
struct LineInput {
    lines: Mutex<Receiver<String>>,
}

impl LineInput {
    fn spawn() -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if sender.send(line).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self::from_receiver(receiver))
    }

    fn from_receiver(receiver: Receiver<String>) -> Self {
        Self {
            lines: Mutex::new(receiver),
        }
    }

    /// Drops lines typed before a prompt was shown.
    fn discard_pending(&self) -> usize {
        let lines = lock_unpoisoned(&self.lines);
        let mut dropped = 0;
        while lines.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    fn read(&self, cancel: Option<&CancelSignal>) -> LineRead {
        let lines = lock_unpoisoned(&self.lines);
        loop {
            if cancel.is_some_and(CancelSignal::is_cancelled) {
                return LineRead::Cancelled;
            }
            match lines.recv_timeout(INPUT_POLL_INTERVAL) {
                Ok(line) => return LineRead::Line(line),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return LineRead::Closed,
            }
        }
    }
}

/// Terminal operator: ANSI-colored output on stdout, answers read from stdin.
#[derive(Debug)]
pub struct Console {
    input: LineInput,
    color: bool,
}

impl Console {
    pub fn new(color: bool) -> io::Result<Self> {
        Ok(Self {
            input: LineInput::spawn()?,
            color,
        })
    }

    /// Prompts for the next user message; `None` once stdin is closed.
    pub fn read_prompt(&self) -> Option<String> {
        print_flush(&format!("{} > ", paint(self.color, BOLD_GREEN, "User")));
        match self.input.read(None) {
            LineRead::Line(line) => Some(line),
            LineRead::Cancelled | LineRead::Closed => None,
        }
    }

    /// Shows a queued input as if it had been typed.
    pub fn echo(&self, input: &str) {
        println!("> {input}");
    }
}

impl Operator for Console {
    fn emit(&self, event: OperatorEvent) {
        println!("{}", render(&event, self.color));
    }

    fn confirm(&self, prompt: &str, cancel: &CancelSignal) -> bool {
        let stale = self.input.discard_pending();
        if stale > 0 {
            tracing::debug!(stale, "discarded input typed ahead of a confirmation");
        }
        print_flush(prompt);
        match self.input.read(Some(cancel)) {
            LineRead::Line(answer) => answer.trim().eq_ignore_ascii_case("y"),
            LineRead::Cancelled | LineRead::Closed => {
                println!();
                false
            }
        }
    }

    fn wait_indicator(&self) -> Option<Spinner> {
        Some(Spinner::start())
    }
}

fn print_flush(text: &str) {
    let mut stdout = io::stdout();
    let _ = write!(stdout, "{text}");
    let _ = stdout.flush();
}

fn paint(color: bool, code: &str, text: &str) -> String {
    if color {
        format!("{code}{text}{RESET}")
    } else {
        text.to_string()
    }
}

#[must_use]
pub fn render(event: &OperatorEvent, color: bool) -> String {
    match event {
        OperatorEvent::Notice(text) => text.clone(),
        OperatorEvent::Diagnostic(text) => paint(color, YELLOW, text),
        OperatorEvent::Thought(text) => format!(
            "\n{}\n{}\n{}",
            paint(color, GRAY, "─── [Thought] ───"),
            render_markdown(text, color),
            paint(color, GRAY, "───────────────────")
        ),
        OperatorEvent::Reply(text) => format!(
            "\n{}\n{}",
            paint(color, BOLD_BLUE, "Agent:"),
            render_markdown(text, color)
        ),
        OperatorEvent::ToolCall(name) => {
            format!("\n{}", paint(color, BOLD_MAGENTA, &format!("Tool Call: {name}")))
        }
        OperatorEvent::ProposedEdit {
            path,
            diff,
            preview,
        } => {
            let mut rendered = format!(
                "Proposed changes to {path}:\n{}",
                colorize_diff(diff.trim_end_matches('\n'), color)
            );
            if !preview.is_empty() {
                rendered.push_str("\nResulting file changes:\n");
                rendered.push_str(&colorize_diff(preview.trim_end_matches('\n'), color));
            }
            rendered
        }
        OperatorEvent::Summary(text) => format!(
            "Context shortened.\nSummary:\n{}",
            render_markdown(text, color)
        ),
    }
}

/// Colors additions green and deletions red, leaving file headers alone.
#[must_use]
pub fn colorize_diff(diff: &str, color: bool) -> String {
    diff.split('\n')
        .map(|line| {
            if line.starts_with('+') && !line.starts_with("+++") {
                paint(color, GREEN, line)
            } else if line.starts_with('-') && !line.starts_with("---") {
                paint(color, RED, line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Elapsed-time spinner on its own thread; stops and clears its line on drop.
#[derive(Debug)]
pub struct Spinner {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Spinner {
    #[must_use]
    pub fn start() -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread = thread::Builder::new()
            .name("spinner".to_string())
            .spawn({
                let stop = Arc::clone(&stop);
                move || spin(&stop)
            })
            .ok();
        Self { stop, thread }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn spin(stop: &AtomicBool) {
    let started = Instant::now();
    for frame in SPINNER_FRAMES.iter().cycle() {
        if stop.load(Ordering::Acquire) {
            break;
        }
        print_flush(&format!(
            "\r{frame} Waiting... ({}s)",
            started.elapsed().as_secs()
        ));
        thread::sleep(SPINNER_INTERVAL);
    }
    print_flush("\r\x1b[K");
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use agent_provider::CancelSignal;

    use super::{colorize_diff, render, LineInput, LineRead, OperatorEvent};

    #[test]
    fn typed_ahead_lines_do_not_answer_the_next_prompt() {
        let (sender, receiver) = mpsc::channel();
        let input = LineInput::from_receiver(receiver);
        sender.send("y".to_string()).expect("send");
        sender.send("y".to_string()).expect("send");

        assert_eq!(input.discard_pending(), 2);
        sender.send("n".to_string()).expect("send");
        assert_eq!(
            input.read(Some(&CancelSignal::new())),
            LineRead::Line("n".to_string())
        );

        drop(sender);
        assert_eq!(input.discard_pending(), 0);
        assert_eq!(input.read(None), LineRead::Closed);
    }

    #[test]
    fn diff_lines_are_colored_by_kind() {
        let diff = "--- a/x\n+++ b/x\n@@\n-old\n+new\n same";
        assert_eq!(
            colorize_diff(diff, true),
            "--- a/x\n+++ b/x\n@@\n\x1b[31m-old\x1b[0m\n\x1b[32m+new\x1b[0m\n same"
        );
        assert_eq!(colorize_diff(diff, false), diff);
    }

    #[test]
    fn proposed_edit_includes_the_file_preview() {
        let rendered = render(
            &OperatorEvent::ProposedEdit {
                path: "src/lib.rs".to_string(),
                diff: "@@\n-a\n+b\n".to_string(),
                preview: "--- a/src/lib.rs\n+++ b/src/lib.rs\n".to_string(),
            },
            false,
        );
        assert_eq!(
            rendered,
            "Proposed changes to src/lib.rs:\n@@\n-a\n+b\nResulting file changes:\n--- a/src/lib.rs\n+++ b/src/lib.rs"
        );
    }

    #[test]
    fn replies_are_rendered_as_markdown() {
        let rendered = render(
            &OperatorEvent::Reply("Done:\n\n- **fixed** `add`".to_string()),
            false,
        );
        assert_eq!(rendered, "\nAgent:\nDone:\n\n- fixed `add`");
    }

    #[test]
    fn plain_rendering_has_no_escape_codes() {
        let rendered = render(&OperatorEvent::ToolCall("run_script".to_string()), false);
        assert_eq!(rendered, "\nTool Call: run_script");
    }
}
