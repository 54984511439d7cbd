//! The transport seam between the control session and the device.
//!
//! [`ControlSession`] never touches a child process directly; it works
//! against the [`BridgeChannel`]/[`ChannelFactory`] trait pair.  The real
//! implementation spawns `adb shell`; the integration tests substitute
//! scripted in-memory channels, the same way the platform input emulators
//! are swapped for recording mocks elsewhere in this codebase.
//!
//! The channel contract is deliberately thin: write one line, read one
//! chunk, close.  `adb shell` gives no per-command framing, so anything
//! smarter (ack matching, timeouts, serialization) belongs to the session,
//! not the transport.
//!
//! [`ControlSession`]: super::session::ControlSession

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

/// A line-oriented interactive channel to the device.
#[async_trait]
pub trait BridgeChannel: Send {
    /// Writes one command line (the newline is appended here).
    async fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Reads the next chunk of output.  `Ok(None)` means the channel
    /// reached EOF: the remote side is gone.
    ///
    /// A chunk is whatever the transport delivered, not a framed message;
    /// callers accumulate chunks and scan.
    async fn read_chunk(&mut self) -> io::Result<Option<String>>;

    /// Tears the channel down.  Must be safe to call after EOF.
    async fn close(&mut self);
}

/// Opens fresh channels.  Spawning is cheap and may be repeated; the
/// session reopens the channel on every reconnect attempt.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    async fn open(&self) -> io::Result<Box<dyn BridgeChannel>>;
}

// ── adb implementation ────────────────────────────────────────────────────────

/// Spawns `adb [-s serial] shell` children as bridge channels.
pub struct AdbShellFactory {
    serial: Option<String>,
}

impl AdbShellFactory {
    pub fn new(serial: Option<String>) -> Self {
        Self { serial }
    }
}

#[async_trait]
impl ChannelFactory for AdbShellFactory {
    async fn open(&self) -> io::Result<Box<dyn BridgeChannel>> {
        let mut command = Command::new("adb");
        if let Some(serial) = &self.serial {
            command.args(["-s", serial.as_str()]);
        }
        command
            .arg("shell")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            // Shell stderr is operator noise ("error: no devices found");
            // liveness is judged by write failures and stdout EOF.
            .stderr(Stdio::null())
            // Backstop: if the session task is ever dropped without a clean
            // close, the child must not outlive the process.
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "adb stdin not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "adb stdout not piped"))?;

        debug!(serial = ?self.serial, "adb shell spawned");
        Ok(Box::new(AdbShellChannel {
            child,
            stdin,
            stdout,
            buf: vec![0u8; 4096],
        }))
    }
}

/// A live `adb shell` child wrapped as a [`BridgeChannel`].
struct AdbShellChannel {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    buf: Vec<u8>,
}

#[async_trait]
impl BridgeChannel for AdbShellChannel {
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        // A dead child surfaces as a write error eventually, but checking
        // first turns "probe the corpse" into an immediate failure.
        if self.child.try_wait()?.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "adb shell exited",
            ));
        }
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await
    }

    async fn read_chunk(&mut self) -> io::Result<Option<String>> {
        let n = self.stdout.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&self.buf[..n]).into_owned()))
    }

    async fn close(&mut self) {
        // Kill errors here mean the child is already gone.
        let _ = self.child.kill().await;
    }
}
