//! Two-tier interrupt handling.
//!
//! The first interrupt cancels the turn in flight. With no turn in flight an
//! interrupt only arms the exit; a second one within [`EXIT_WINDOW`] ends the
//! process with [`INTERRUPT_EXIT_CODE`].

use std::time::{Duration, Instant};

use crate::turn::TurnSlot;

pub const EXIT_WINDOW: Duration = Duration::from_secs(1);
pub const INTERRUPT_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    CancelledTurn,
    ArmedExit,
    Exit,
}

#[derive(Debug, Default)]
pub struct InterruptPolicy {
    last_idle_interrupt: Option<Instant>,
}

impl InterruptPolicy {
    pub fn on_interrupt(&mut self, turns: &TurnSlot, now: Instant) -> InterruptAction {
        if turns.cancel_active() {
            return InterruptAction::CancelledTurn;
        }
        if self
            .last_idle_interrupt
            .is_some_and(|last| now.saturating_duration_since(last) < EXIT_WINDOW)
        {
            return InterruptAction::Exit;
        }
        self.last_idle_interrupt = Some(now);
        InterruptAction::ArmedExit
    }
}

#[cfg(unix)]
pub use listener::{install, InterruptListener};

#[cfg(unix)]
mod listener {
    use std::io;
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Instant;

    use signal_hook::iterator::{Handle, Signals};

    use super::{InterruptAction, InterruptPolicy, INTERRUPT_EXIT_CODE};
    use crate::operator::{Operator, OperatorEvent};
    use crate::turn::TurnSlot;

    /// SIGINT listener thread; stops when dropped.
    pub struct InterruptListener {
        handle: Handle,
        thread: Option<JoinHandle<()>>,
    }

    impl Drop for InterruptListener {
        fn drop(&mut self) {
            self.handle.close();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }

    pub fn install(turns: TurnSlot, operator: Arc<dyn Operator>) -> io::Result<InterruptListener> {
        let mut signals = Signals::new([libc::SIGINT])?;
        let handle = signals.handle();

        let thread = thread::Builder::new()
            .name("interrupt-listener".to_string())
            .spawn(move || {
                let mut policy = InterruptPolicy::default();
                for _ in signals.forever() {
                    match policy.on_interrupt(&turns, Instant::now()) {
                        InterruptAction::CancelledTurn => {
                            tracing::info!("turn interrupted");
                            operator.emit(OperatorEvent::Notice(
                                "\n[Interrupted by user]".to_string(),
                            ));
                        }
                        InterruptAction::ArmedExit => operator.emit(OperatorEvent::Notice(
                            "\n(Press Ctrl+C again to exit)".to_string(),
                        )),
                        InterruptAction::Exit => {
                            operator.emit(OperatorEvent::Notice("\nExiting...".to_string()));
                            std::process::exit(INTERRUPT_EXIT_CODE);
                        }
                    }
                }
            })?;

        Ok(InterruptListener {
            handle,
            thread: Some(thread),
        })
    }
}
