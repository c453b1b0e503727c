//! The debugger engine: one GDB subprocess at a time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::capture::CaptureWindow;
use crate::config::DebuggerConfig;
use crate::error::{DebuggerError, Result};

/// Line emitted on the live channel when the subprocess goes away.
pub const EXIT_LINE_PREFIX: &str = "[debugger exited";

/// How long the reader keeps draining pipes after the process exits.
const EXIT_DRAIN: Duration = Duration::from_millis(200);

/// Capacity of the internal line queue between pipe pumps and the reader.
const LINE_QUEUE: usize = 1024;

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebuggerStatus {
    /// Whether a subprocess is alive.
    pub running: bool,
    /// Executable being debugged.
    pub executable: Option<PathBuf>,
    /// Subprocess id.
    pub pid: Option<u32>,
    /// When the subprocess was started.
    pub started_at: Option<DateTime<Utc>>,
}

/// Handles owned for the lifetime of one subprocess.
struct DebuggerSession {
    executable: PathBuf,
    pid: Option<u32>,
    stdin: ChildStdin,
    exited: watch::Receiver<bool>,
    reader: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

/// Owns the debugger subprocess and multiplexes its output.
///
/// Output lines flow from a single reader task to two places: the live
/// broadcast channel (lossy, for terminals) and the capture window (for
/// `execute_with_capture`). The session mutex serializes every write to
/// stdin, so at most one capture is open at a time.
pub struct DebuggerEngine {
    config: DebuggerConfig,
    session: Mutex<Option<DebuggerSession>>,
    running: Arc<AtomicBool>,
    capture: Arc<StdMutex<CaptureWindow>>,
    output_tx: RwLock<broadcast::Sender<String>>,
}

impl std::fmt::Debug for DebuggerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebuggerEngine")
            .field("debugger", &self.config.debugger)
            .field("running", &self.is_running())
            .finish()
    }
}

impl DebuggerEngine {
    /// Creates an engine with no subprocess.
    pub fn new(config: DebuggerConfig) -> Self {
        let (output_tx, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            config,
            session: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            capture: Arc::new(StdMutex::new(CaptureWindow::new())),
            output_tx: RwLock::new(output_tx),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    /// Whether a subprocess is alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribe to live output lines.
    ///
    /// Slow subscribers lose lines. The channel is replaced on `stop`, so a
    /// subscriber sees `Closed` once its session ends and should resubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.output_tx
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .subscribe()
    }

    /// Current status.
    pub async fn status(&self) -> DebuggerStatus {
        let session = self.session.lock().await;
        let running = self.is_running();
        match session.as_ref() {
            Some(s) => DebuggerStatus {
                running,
                executable: Some(s.executable.clone()),
                pid: s.pid,
                started_at: Some(s.started_at),
            },
            None => DebuggerStatus {
                running,
                executable: None,
                pid: None,
                started_at: None,
            },
        }
    }

    /// Start the debugger on `executable`, stopping any previous session.
    pub async fn start(&self, executable: &Path) -> Result<()> {
        let mut session = self.session.lock().await;

        if let Some(previous) = session.take() {
            debug!(executable = %previous.executable.display(), "stopping previous session before start");
            self.shutdown_session(previous).await;
        }

        let debugger = self.config.resolve_debugger()?;
        if !executable.exists() {
            return Err(DebuggerError::ExecutableNotFound(executable.to_path_buf()));
        }

        let mut command = Command::new(&debugger);
        command
            .args(&self.config.args)
            .arg(executable)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        // Own process group: signals aimed at the debugger never reach us.
        #[cfg(unix)]
        command.process_group(0);

        debug!(
            debugger = %debugger.display(),
            args = ?self.config.args,
            executable = %executable.display(),
            "spawning debugger"
        );

        let mut child = command.spawn().map_err(DebuggerError::Spawn)?;
        let stdin = child.stdin.take().ok_or(DebuggerError::Pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(DebuggerError::Pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(DebuggerError::Pipe("stderr"))?;
        let pid = child.id();

        // stdout and stderr merge into one line queue.
        let (line_tx, line_rx) = mpsc::channel(LINE_QUEUE);
        tokio::spawn(pump_lines(stdout, line_tx.clone()));
        tokio::spawn(pump_lines(stderr, line_tx));

        let (exit_tx, exit_rx) = watch::channel(false);
        let output_tx = self
            .output_tx
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        self.running.store(true, Ordering::SeqCst);
        let reader = tokio::spawn(reader_loop(
            child,
            line_rx,
            output_tx,
            Arc::clone(&self.capture),
            Arc::clone(&self.running),
            exit_tx,
        ));

        *session = Some(DebuggerSession {
            executable: executable.to_path_buf(),
            pid,
            stdin,
            exited: exit_rx,
            reader,
            started_at: Utc::now(),
        });

        info!(executable = %executable.display(), pid = ?pid, "debugger started");
        Ok(())
    }

    /// Stop the debugger. Stopping an engine with no session is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        match session.take() {
            Some(s) => {
                self.shutdown_session(s).await;
                Ok(())
            }
            None => {
                debug!("stop requested with no debugger session");
                Ok(())
            }
        }
    }

    /// Write one line to the debugger's stdin.
    pub async fn send_line(&self, line: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        let s = self.live_session(&mut session)?;
        write_line(&mut s.stdin, line).await
    }

    /// Issue `command` and return what the debugger printed within `timeout`
    /// (the configured default when `None`).
    ///
    /// Capture is time-bounded: output arriving after the wait belongs to no
    /// one. An empty buffer at the deadline is reported as
    /// [`DebuggerError::CaptureTimeout`].
    pub async fn execute_with_capture(
        &self,
        command: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let wait = timeout.unwrap_or(self.config.capture_timeout);
        let mut session = self.session.lock().await;
        let s = self.live_session(&mut session)?;

        // Closes the window even if this future is dropped mid-wait.
        let mut window = CaptureGuard::open(&self.capture);
        write_line(&mut s.stdin, command).await?;
        trace!(command, wait_ms = wait.as_millis() as u64, "capture window open");

        let mut exited = s.exited.clone();
        let waited = tokio::select! {
            _ = tokio::time::sleep(wait) => Ok(()),
            _ = cancel.cancelled() => Err(DebuggerError::Cancelled),
            _ = exited.wait_for(|gone| *gone) => Ok(()),
        };
        let captured = window.close();
        waited?;

        if captured.is_empty() {
            if !self.is_running() {
                return Err(DebuggerError::NotRunning);
            }
            return Err(DebuggerError::CaptureTimeout {
                command: command.to_string(),
                timeout: wait,
            });
        }

        debug!(command, bytes = captured.len(), "capture complete");
        Ok(captured)
    }

    fn live_session<'a>(
        &self,
        session: &'a mut Option<DebuggerSession>,
    ) -> Result<&'a mut DebuggerSession> {
        match session.as_mut() {
            Some(s) if self.is_running() => Ok(s),
            _ => Err(DebuggerError::NotRunning),
        }
    }

    fn capture_close(&self) -> String {
        lock_window(&self.capture).close()
    }

    async fn shutdown_session(&self, mut session: DebuggerSession) {
        let executable = session.executable.display().to_string();

        if self.is_running() {
            if let Err(e) = write_line(&mut session.stdin, &self.config.quit_command).await {
                debug!(error = %e, "quit command not delivered");
            }
        }
        drop(session.stdin);

        let mut exited = session.exited;
        let graceful = tokio::time::timeout(self.config.stop_grace, exited.wait_for(|gone| *gone))
            .await
            .is_ok();

        if !graceful {
            warn!(executable = %executable, pid = ?session.pid, "debugger ignored quit, killing process group");
            kill_process_group(session.pid);
        }

        match tokio::time::timeout(self.config.stop_grace, &mut session.reader).await {
            Ok(_) => {}
            Err(_) => {
                warn!(executable = %executable, "reader task did not finish, aborting");
                session.reader.abort();
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.capture_close();

        // Fresh channel for the next session; old subscribers see Closed.
        let (fresh, _) = broadcast::channel(self.config.channel_capacity.max(1));
        *self
            .output_tx
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = fresh;

        info!(executable = %executable, graceful, "debugger stopped");
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> Result<()> {
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line.trim_end_matches(['\r', '\n']));
    buf.push('\n');
    stdin.write_all(buf.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created for this child.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Reads `\n`-terminated lines (lossy UTF-8) into the queue until EOF.
async fn pump_lines<R>(stream: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "debugger pipe read failed");
                break;
            }
        }
    }
}

fn fan_out(
    line: String,
    output_tx: &broadcast::Sender<String>,
    capture: &StdMutex<CaptureWindow>,
) {
    lock_window(capture).push(&line);
    // No receivers is fine; lagging receivers drop old lines.
    let _ = output_tx.send(line);
}

async fn reader_loop(
    mut child: Child,
    mut lines: mpsc::Receiver<String>,
    output_tx: broadcast::Sender<String>,
    capture: Arc<StdMutex<CaptureWindow>>,
    running: Arc<AtomicBool>,
    exit_tx: watch::Sender<bool>,
) {
    let status = loop {
        tokio::select! {
            biased;
            line = lines.recv() => match line {
                Some(line) => fan_out(line, &output_tx, &capture),
                None => break child.wait().await,
            },
            status = child.wait() => {
                // A grandchild may still hold the pipes open; take what is buffered.
                while let Ok(Some(line)) = tokio::time::timeout(EXIT_DRAIN, lines.recv()).await {
                    fan_out(line, &output_tx, &capture);
                }
                break status;
            }
        }
    };

    running.store(false, Ordering::SeqCst);
    let exit_line = match status {
        Ok(status) => format!("{}: {}]", EXIT_LINE_PREFIX, status),
        Err(e) => format!("{}: {}]", EXIT_LINE_PREFIX, e),
    };
    info!(line = %exit_line, "debugger process ended");
    fan_out(exit_line, &output_tx, &capture);
    let _ = exit_tx.send(true);
}

/// An open capture window, closed on drop.
struct CaptureGuard<'a> {
    window: &'a StdMutex<CaptureWindow>,
    closed: bool,
}

impl<'a> CaptureGuard<'a> {
    fn open(window: &'a StdMutex<CaptureWindow>) -> Self {
        lock_window(window).open();
        Self {
            window,
            closed: false,
        }
    }

    fn close(&mut self) -> String {
        self.closed = true;
        lock_window(self.window).close()
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        if !self.closed {
            let discarded = lock_window(self.window).close();
            trace!(bytes = discarded.len(), "abandoned capture window closed");
        }
    }
}

fn lock_window(window: &StdMutex<CaptureWindow>) -> std::sync::MutexGuard<'_, CaptureWindow> {
    window.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
