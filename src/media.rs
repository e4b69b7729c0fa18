//! Spawning of the external `ffprobe` and `ffmpeg` tools

use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::CoverError;

/// Upper bound for one duration probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound for one frame extraction
pub const EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run a command to completion, killing it once `timeout` has passed
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> io::Result<Output> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // drain both pipes so a chatty child cannot block on a full buffer
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let stdout_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(out) = stdout.as_mut() {
            let _ = out.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(err) = stderr.as_mut() {
            let _ = err.read_to_end(&mut buf);
        }
        buf
    });

    let started = Instant::now();
    loop {
        match child.try_wait()? {
            Some(status) => {
                return Ok(Output {
                    status,
                    stdout: stdout_handle.join().unwrap_or_default(),
                    stderr: stderr_handle.join().unwrap_or_default(),
                });
            }
            None if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("command timed out after {}s", timeout.as_secs()),
                ));
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    }
}

/// Parse the `format=duration` value printed by ffprobe
pub fn parse_duration(output: &str) -> Option<f64> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite())
}

/// Video duration in seconds, `None` when ffprobe is missing or cannot tell
pub fn probe_duration(video: &Path) -> Option<f64> {
    let mut cmd = Command::new("ffprobe");
    cmd.args([
        "-hide_banner",
        "-loglevel",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=nw=1:nk=1",
    ])
    .arg(video);

    let output = match run_with_timeout(&mut cmd, PROBE_TIMEOUT) {
        Ok(o) => o,
        Err(e) => {
            debug!("ffprobe failed for {}: {}", video.display(), e);
            return None;
        }
    };

    if !output.status.success() {
        debug!(
            "ffprobe exited with {} for {}",
            output.status,
            video.display()
        );
        return None;
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

/// Timestamp for a cover frame: the preferred time, but never past the middle
/// of a video with a known positive duration
pub fn frame_timestamp(preferred: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(d) if d > 0.0 => preferred.min((d / 2.0).max(0.0)),
        _ => preferred,
    }
}

/// Write one frame at `at_seconds` to `out`; the format follows the extension of `out`
pub fn extract_frame(video: &Path, out: &Path, at_seconds: f64) -> Result<(), CoverError> {
    trace!("Extracting frame at {}s from {}", at_seconds, video.display());

    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-nostdin", "-hide_banner", "-loglevel", "error", "-ss"])
        .arg(format!("{:.3}", at_seconds))
        .arg("-i")
        .arg(video)
        .args(["-frames:v", "1"])
        .arg(out);

    let output = run_with_timeout(&mut cmd, EXTRACT_TIMEOUT)
        .map_err(|e| CoverError::Extract(format!("ffmpeg execution failed: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CoverError::Extract(format!(
            "ffmpeg failed: {}",
            stderr.lines().last().unwrap_or("unknown error")
        )));
    }

    if !out.exists() {
        return Err(CoverError::Extract("ffmpeg produced no output".to_string()));
    }

    Ok(())
}
