use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use agent_provider::CancelSignal;
use wait_timeout::ChildExt;

use crate::error::ScriptError;
use crate::roots::SkillRoots;

/// Output longer than this (in characters) is moved to a sidecar file.
pub const MAX_OUTPUT_CHARS: usize = 50_000;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Validates and executes skill scripts under a cancellation scope.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    roots: SkillRoots,
    outputs_dir: PathBuf,
    max_output_chars: usize,
}

impl ScriptRunner {
    #[must_use]
    pub fn new(roots: SkillRoots, outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            roots,
            outputs_dir: outputs_dir.into(),
            max_output_chars: MAX_OUTPUT_CHARS,
        }
    }

    #[must_use]
    pub fn with_max_output_chars(mut self, max_output_chars: usize) -> Self {
        self.max_output_chars = max_output_chars;
        self
    }

    #[must_use]
    pub fn roots(&self) -> &SkillRoots {
        &self.roots
    }

    /// Runs the script at `path` with positional `args` and returns its
    /// combined stdout and stderr.
    ///
    /// The child runs in its own process group, and the whole group is
    /// killed as soon as `cancel` fires. That includes the time after the
    /// child exits while background processes still hold its output pipes.
    /// A non-zero exit is an error that still carries the output.
    pub fn run(
        &self,
        path: &str,
        args: &[String],
        cancel: &CancelSignal,
    ) -> Result<String, ScriptError> {
        let script = self.roots.resolve_script(path)?;
        let mut command = interpreter_command(&script);
        command
            .args(args)
            .current_dir(self.roots.project_root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        tracing::info!(script = %script.display(), ?args, "launching script");
        let program = format!("{:?}", command.get_program());
        let mut child = command
            .spawn()
            .map_err(|source| ScriptError::Launch { program, source })?;

        let combined = Arc::new(Mutex::new(Vec::new()));
        let (drained, drains) = mpsc::channel();
        let readers = [
            spawn_drain(child.stdout.take(), Arc::clone(&combined), drained.clone()),
            spawn_drain(child.stderr.take(), Arc::clone(&combined), drained),
        ]
        .into_iter()
        .filter(|spawned| *spawned)
        .count();

        // On cancellation the readers are left to finish when the pipes close.
        let status = wait_or_cancel(&mut child, cancel)?;
        await_drains(&mut child, &drains, readers, cancel)?;

        let bytes = std::mem::take(&mut *lock_unpoisoned(&combined));
        let output = self.bound_output(String::from_utf8_lossy(&bytes).into_owned());

        if status.success() {
            Ok(output)
        } else {
            Err(ScriptError::Failed {
                status: status.to_string(),
                output,
            })
        }
    }

    fn bound_output(&self, output: String) -> String {
        let chars = output.chars().count();
        if chars <= self.max_output_chars {
            return output;
        }

        let sidecar = self
            .outputs_dir
            .join(format!("output_{}.txt", uuid::Uuid::new_v4()));
        let written = fs::create_dir_all(&self.outputs_dir)
            .and_then(|()| fs::write(&sidecar, output.as_bytes()));
        match written {
            Ok(()) => {
                tracing::info!(sidecar = %sidecar.display(), chars, "script output moved to sidecar");
                format!(
                    "Output too large ({chars} chars). Saved to {}\nRead this file to see the results.",
                    sidecar.display()
                )
            }
            Err(error) => {
                tracing::warn!(%error, "failed to write script output sidecar");
                output
            }
        }
    }
}

fn interpreter_command(script: &Path) -> Command {
    let interpreter = match script.extension().and_then(|ext| ext.to_str()) {
        Some("py") => Some("python3"),
        Some("sh") => Some("bash"),
        Some("js") => Some("node"),
        _ => None,
    };
    match interpreter {
        Some(interpreter) => {
            let mut command = Command::new(interpreter);
            command.arg(script);
            command
        }
        None => Command::new(script),
    }
}

/// Copies `pipe` into `sink` on a detached thread that reports on `done`
/// once the pipe closes. Returns whether a reader was started.
fn spawn_drain(
    pipe: Option<impl Read + Send + 'static>,
    sink: Arc<Mutex<Vec<u8>>>,
    done: Sender<()>,
) -> bool {
    let Some(mut pipe) = pipe else {
        return false;
    };
    thread::spawn(move || {
        let mut buffer = [0_u8; 8192];
        loop {
            match pipe.read(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(read) => lock_unpoisoned(&sink).extend_from_slice(&buffer[..read]),
            }
        }
        let _ = done.send(());
    });
    true
}

/// Waits for `pending` readers to hit end of file. Background processes
/// left by the script keep the pipes open, so this wait is cancellable too.
fn await_drains(
    child: &mut Child,
    drains: &Receiver<()>,
    mut pending: usize,
    cancel: &CancelSignal,
) -> Result<(), ScriptError> {
    while pending > 0 {
        if cancel.is_cancelled() {
            kill_tree(child);
            tracing::info!("script cancelled while its output pipes were held open");
            return Err(ScriptError::Cancelled);
        }
        match drains.recv_timeout(CANCEL_POLL_INTERVAL) {
            Ok(()) => pending -= 1,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

fn wait_or_cancel(child: &mut Child, cancel: &CancelSignal) -> Result<ExitStatus, ScriptError> {
    loop {
        if cancel.is_cancelled() {
            kill_tree(child);
            let _ = child.wait();
            tracing::info!("script cancelled");
            return Err(ScriptError::Cancelled);
        }
        match child.wait_timeout(CANCEL_POLL_INTERVAL) {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(source) => {
                let _ = child.kill();
                return Err(ScriptError::Wait { source });
            }
        }
    }
}

/// Kills the child's process group. The group id is the child's pid and
/// stays valid while any member, such as a background job, is alive.
#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: kill(2) takes plain integers and touches no memory.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
