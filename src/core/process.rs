//! Running the emulator.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::models::{ConsoleLine, ConsoleStream};
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exit code reported when the process was killed by a signal.
pub const SIGNALED_EXIT_CODE: i32 = -1;

struct Running {
    id: u64,
    child: Child,
}

/// Handle to at most one running Ryujinx process.
#[derive(Clone, Default)]
pub struct EmulatorProcess {
    running: Arc<Mutex<Option<Running>>>,
    next_id: Arc<AtomicU64>,
}

impl EmulatorProcess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts `executable` with `game` as its only argument.
    ///
    /// Each stdout/stderr line is handed to `on_output` from a reader
    /// thread. Once the process has exited and both streams are drained,
    /// `on_termination` receives the exit code. Fails if a process is
    /// already running.
    pub fn launch<F, T>(&self, executable: &Path, game: &Path, on_output: F, on_termination: T) -> Result<()>
    where
        F: Fn(ConsoleLine) + Send + Sync + 'static,
        T: FnOnce(i32) + Send + 'static,
    {
        let mut slot = self.slot();
        if slot.is_some() {
            return Err(Error::Launch("Ryujinx is already running".to_string()));
        }

        log::info!("Launching {} {}", executable.display(), game.display());
        let mut child = Command::new(executable)
            .arg(game)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Launch(format!("{}: {}", executable.display(), e)))?;

        let on_output = Arc::new(on_output);
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, ConsoleStream::Stdout, Arc::clone(&on_output)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, ConsoleStream::Stderr, Arc::clone(&on_output)));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some(Running { id, child });
        drop(slot);

        let running = Arc::clone(&self.running);
        thread::Builder::new()
            .name("ryujinx-wait".to_string())
            .spawn(move || {
                let code = wait_for_exit(&running, id);
                for reader in readers {
                    let _ = reader.join();
                }
                log::info!("Ryujinx exited with status {}", code);
                on_termination(code);
            })
            .map_err(|e| Error::Launch(format!("failed to watch process: {}", e)))?;

        Ok(())
    }

    /// Kills and reaps the running process, leaving the handle free for
    /// the next launch. The termination callback still fires.
    pub fn stop(&self) {
        let Some(mut running) = self.slot().take() else {
            return;
        };
        if let Err(e) = running.child.kill() {
            log::warn!("Failed to stop Ryujinx: {}", e);
        }
        match running.child.wait() {
            Ok(status) => log::debug!("Stopped Ryujinx: {}", status),
            Err(e) => log::warn!("Failed to reap Ryujinx: {}", e),
        }
    }
}

/// Polls until the child launched as `id` exits. A child taken out of the
/// slot by `stop` counts as signaled.
fn wait_for_exit(running: &Mutex<Option<Running>>, id: u64) -> i32 {
    loop {
        {
            let mut slot = running.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(current) = slot.as_mut().filter(|r| r.id == id) else {
                return SIGNALED_EXIT_CODE;
            };
            match current.child.try_wait() {
                Ok(Some(status)) => {
                    slot.take();
                    return status.code().unwrap_or(SIGNALED_EXIT_CODE);
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("Failed to wait for Ryujinx: {}", e);
                    slot.take();
                    return SIGNALED_EXIT_CODE;
                }
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader<R, F>(stream: R, kind: ConsoleStream, on_output: Arc<F>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
    F: Fn(ConsoleLine) + Send + Sync + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    on_output(ConsoleLine::new(text.trim_end_matches(['\r', '\n']), kind));
                }
                Err(e) => {
                    log::debug!("Output stream closed: {}", e);
                    break;
                }
            }
        }
    })
}
