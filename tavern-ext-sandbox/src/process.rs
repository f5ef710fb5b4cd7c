//! Single sandboxed script subprocess.
//!
//! [`SandboxProcess`] owns one runner subprocess with piped stdio. Stdout
//! lines are parsed into [`BridgeCommand`]s, stderr lines are collected for
//! error reporting, and [`BridgeEvent`]s are serialized onto stdin.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::error::SandboxError;
use crate::protocol::{BridgeCommand, BridgeEvent};

type LineSink = Arc<Mutex<Vec<String>>>;

fn lock_recovering<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("sandbox buffer mutex poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Spawn a thread that pushes every non-empty line from `source` into `sink`.
fn spawn_line_reader(
    label: &'static str,
    source: impl Read + Send + 'static,
    sink: LineSink,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let reader = BufReader::new(source);
        for line in reader.lines() {
            match line {
                Ok(text) if text.is_empty() => continue,
                Ok(text) => lock_recovering(&sink).push(text),
                Err(e) => {
                    log::warn!("sandbox {label} reader stopped: {e}");
                    break;
                }
            }
        }
    })
}

/// One running script context.
pub struct SandboxProcess {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_lines: LineSink,
    stderr_lines: LineSink,
    _stdout_thread: JoinHandle<()>,
    _stderr_thread: JoinHandle<()>,
}

impl SandboxProcess {
    /// Spawn the runner over an execution document.
    ///
    /// `script_name` is used for error context only.
    pub fn spawn(
        script_name: &str,
        program: &str,
        args: &[String],
    ) -> Result<Self, SandboxError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                script: script_name.to_string(),
                program: program.to_string(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or(SandboxError::Stdio {
            script: script_name.to_string(),
            stream: "stdout",
        })?;
        let stderr = child.stderr.take().ok_or(SandboxError::Stdio {
            script: script_name.to_string(),
            stream: "stderr",
        })?;

        let stdout_lines: LineSink = Arc::new(Mutex::new(Vec::new()));
        let stderr_lines: LineSink = Arc::new(Mutex::new(Vec::new()));

        Ok(Self {
            _stdout_thread: spawn_line_reader("stdout", stdout, Arc::clone(&stdout_lines)),
            _stderr_thread: spawn_line_reader("stderr", stderr, Arc::clone(&stderr_lines)),
            child: Some(child),
            stdin,
            stdout_lines,
            stderr_lines,
        })
    }

    /// Whether the subprocess is still alive (non-blocking check).
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Serialize a [`BridgeEvent`] onto the context's stdin as one line.
    pub fn send_event(&mut self, script_id: &str, event: &BridgeEvent) -> Result<(), SandboxError> {
        let stdin = self.stdin.as_mut().ok_or_else(|| SandboxError::Send {
            script_id: script_id.to_string(),
            message: "stdin already closed".to_string(),
        })?;
        let json = serde_json::to_string(event).map_err(|e| SandboxError::Send {
            script_id: script_id.to_string(),
            message: format!("serialize failed: {e}"),
        })?;
        writeln!(stdin, "{json}")
            .and_then(|()| stdin.flush())
            .map_err(|e| SandboxError::Send {
                script_id: script_id.to_string(),
                message: format!("write failed: {e}"),
            })
    }

    /// Drain commands parsed from the context's stdout since the last call.
    ///
    /// Unparseable lines are logged and dropped.
    pub fn drain_commands(&self) -> Vec<BridgeCommand> {
        lock_recovering(&self.stdout_lines)
            .drain(..)
            .filter_map(|line| match serde_json::from_str::<BridgeCommand>(&line) {
                Ok(cmd) => Some(cmd),
                Err(e) => {
                    log::warn!("sandbox emitted a non-command line ({e}): {line:?}");
                    None
                }
            })
            .collect()
    }

    /// Drain stderr lines collected since the last call.
    pub fn drain_errors(&self) -> Vec<String> {
        lock_recovering(&self.stderr_lines).drain(..).collect()
    }

    /// Tear the context down.
    ///
    /// Closes stdin (EOF lets a well-behaved script exit its event loop),
    /// kills the subprocess if still alive, and reaps it. Never fails;
    /// individual cleanup errors are logged.
    pub fn stop(&mut self) {
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                log::debug!("sandbox kill: {e}");
            }
            if let Err(e) = child.wait() {
                log::warn!("sandbox reap failed: {e}");
            }
        }
    }
}

impl Drop for SandboxProcess {
    fn drop(&mut self) {
        self.stop();
    }
}
