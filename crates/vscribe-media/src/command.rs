//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{DescribeError, DescribeResult};

/// One input file with its pre-`-i` arguments.
#[derive(Debug, Clone)]
struct Input {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for FFmpeg commands.
///
/// Mixing runs take several inputs (source audio, narration, music bed),
/// so the builder accepts any number of `-i` entries. Analysis runs
/// (`volumedetect`) use a null output.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    /// Output file path; `None` renders to `-f null -` (analysis only)
    output: Option<PathBuf>,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: Some(output.as_ref().to_path_buf()),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Create an analysis command with a null output.
    pub fn analysis() -> Self {
        Self {
            inputs: Vec::new(),
            output: None,
            output_args: Vec::new(),
            overwrite: false,
            log_level: "info".to_string(),
        }
    }

    /// Add an input file.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with_args(Vec::<String>::new(), path)
    }

    /// Add an input file with arguments placed before its `-i`.
    pub fn input_with_args<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(Input {
            args: args.into_iter().map(Into::into).collect(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Add a seeked input: fast `-ss` before `-i`, optionally bounded by `-t`.
    pub fn seeked_input(
        self,
        path: impl AsRef<Path>,
        start_secs: f64,
        duration_secs: Option<f64>,
    ) -> Self {
        let mut args = vec!["-ss".to_string(), format!("{:.3}", start_secs)];
        if let Some(d) = duration_secs {
            args.push("-t".to_string());
            args.push(format!("{:.3}", d));
        }
        self.input_with_args(args, path)
    }

    /// Add an output argument (after the inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set audio filter.
    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Map a stream into the output.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.clone());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.clone());

        match &self.output {
            Some(path) => args.push(path.to_string_lossy().to_string()),
            None => {
                args.push("-f".to_string());
                args.push("null".to_string());
                args.push("-".to_string());
            }
        }

        args
    }
}

/// Runner for FFmpeg commands with cancellation and timeout.
pub struct FfmpegRunner {
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self {
            cancel_rx: None,
            timeout_secs: None,
        }
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command, discarding its output.
    pub async fn run(&self, cmd: &FfmpegCommand) -> DescribeResult<()> {
        self.run_capture_stderr(cmd).await.map(|_| ())
    }

    /// Run an FFmpeg command and return its captured stderr.
    ///
    /// Analysis filters like `volumedetect` report on stderr, so the
    /// full stream is returned for parsing.
    pub async fn run_capture_stderr(&self, cmd: &FfmpegCommand) -> DescribeResult<String> {
        which::which("ffmpeg").map_err(|_| DescribeError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                use tokio::io::AsyncReadExt;
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        let status = self.wait_for_completion(&mut child).await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(stderr)
        } else {
            Err(DescribeError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr),
                status.code(),
            ))
        }
    }

    /// Wait for the child process, honoring cancellation and timeout.
    async fn wait_for_completion(
        &self,
        child: &mut tokio::process::Child,
    ) -> DescribeResult<std::process::ExitStatus> {
        let timeout = self
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(Duration::MAX);
        let mut cancel_rx = self.cancel_rx.clone();

        tokio::select! {
            status = child.wait() => Ok(status?),
            _ = tokio::time::sleep(timeout), if self.timeout_secs.is_some() => {
                warn!(
                    timeout_secs = self.timeout_secs,
                    "FFmpeg timed out, killing process"
                );
                let _ = child.kill().await;
                Err(DescribeError::Timeout(self.timeout_secs.unwrap_or(0)))
            }
            _ = wait_for_cancel(&mut cancel_rx), if cancel_rx.is_some() => {
                info!("FFmpeg cancelled, killing process");
                let _ = child.kill().await;
                Err(DescribeError::Cancelled)
            }
        }
    }
}

async fn wait_for_cancel(cancel_rx: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = cancel_rx {
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
    // Sender dropped without cancelling; never resolve
    std::future::pending::<()>().await;
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> DescribeResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| DescribeError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> DescribeResult<PathBuf> {
    which::which("ffprobe").map_err(|_| DescribeError::FfprobeNotFound)
}
