use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::ToolError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run `command` to completion, killing it once `timeout` elapses.
///
/// Both pipes are drained on their own threads while the child runs, so a
/// chatty tool cannot stall on a full pipe buffer.
pub fn run_with_timeout(
    tool: &str,
    command: &mut Command,
    timeout: Duration,
) -> Result<ProcessOutput, ToolError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ToolError::Spawn { tool: tool.to_string(), source })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                reap(&mut child);
                return Err(ToolError::Timeout { tool: tool.to_string(), after: timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                reap(&mut child);
                return Err(ToolError::Io { tool: tool.to_string(), source });
            }
        }
    };

    let stdout =
        collect(stdout).map_err(|source| ToolError::Io { tool: tool.to_string(), source })?;
    // stderr is diagnostic only; a read failure should not hide stdout.
    let stderr = collect(stderr).unwrap_or_default();

    Ok(ProcessOutput { status, stdout, stderr })
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

type Drain = Option<JoinHandle<std::io::Result<Vec<u8>>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Drain {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn collect(handle: Drain) -> std::io::Result<String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "pipe reader panicked"))??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
