use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::playlist::parse_segments;
use crate::{TranscodeError, TranscoderConfig};

/// Outcome of one transcoder invocation.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub success: bool,
    pub playlist_path: PathBuf,
    pub stream_dir: PathBuf,
    /// Segment filenames in playback order. Empty when `success` is false.
    pub segments: Vec<String>,
    /// Process exit code; `None` if terminated by a signal.
    pub exit_code: Option<i32>,
    /// Ordered diagnostic lines captured from the transcoder's stderr.
    pub log_lines: Vec<String>,
}

/// Runs ffmpeg to package a video as an HLS VOD stream.
#[derive(Debug, Clone)]
pub struct TranscodeInvoker {
    config: TranscoderConfig,
}

impl TranscodeInvoker {
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Convert `input` into a VOD package: numbered `.ts` segments under
    /// `stream_dir` plus the playlist at `playlist_path`.
    pub async fn invoke(
        &self,
        input: &Path,
        playlist_path: &Path,
        stream_dir: &Path,
    ) -> Result<ConversionResult, TranscodeError> {
        self.invoke_with_cancel(input, playlist_path, stream_dir, CancellationToken::new())
            .await
    }

    /// Like [`invoke`](Self::invoke), but terminates the transcoder early
    /// when `cancel` fires. The process exit is awaited either way, so the
    /// caller may safely delete the output directory once this returns.
    pub async fn invoke_with_cancel(
        &self,
        input: &Path,
        playlist_path: &Path,
        stream_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<ConversionResult, TranscodeError> {
        tokio::fs::create_dir_all(stream_dir).await?;

        let segment_pattern = stream_dir.join("%d.ts");
        let args: Vec<String> = vec![
            "-nostdin".into(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-vcodec".into(),
            "libx264".into(),
            "-acodec".into(),
            "aac".into(),
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            self.config.segment_secs.to_string(),
            "-hls_playlist_type".into(),
            "vod".into(),
            "-hls_segment_filename".into(),
            segment_pattern.to_string_lossy().into_owned(),
            "-start_number".into(),
            "1".into(),
            playlist_path.to_string_lossy().into_owned(),
        ];

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TranscodeError::Launch {
                path: self.config.ffmpeg_path.clone(),
                source: e,
            })?;

        info!(ffmpeg = %self.config.ffmpeg_path.display(), ?args, "spawned transcoder");

        // Drain stderr on its own task so a full pipe can never stall the
        // process, and exit detection never races the capture: the reader
        // stops at EOF, which the OS delivers once the process is gone, and
        // we join it after wait() below. Both ends are always observed.
        let stderr = child.stderr.take();
        let drain = tokio::spawn(async move {
            let mut lines = Vec::new();
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    debug!(target: "vodserve::transcode", "{line}");
                    lines.push(line);
                }
            }
            lines
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                warn!("transcode cancelled, killing process");
                child.start_kill()?;
                child.wait().await?
            }
        };

        let log_lines = match drain.await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "stderr capture task failed");
                Vec::new()
            }
        };

        let exit_code = status.code();
        info!(exit_code = ?exit_code, "transcoder exited");

        if !status.success() {
            // The playlist may be missing or partial; it is never read here.
            return Ok(ConversionResult {
                success: false,
                playlist_path: playlist_path.to_path_buf(),
                stream_dir: stream_dir.to_path_buf(),
                segments: Vec::new(),
                exit_code,
                log_lines,
            });
        }

        let text = tokio::fs::read_to_string(playlist_path)
            .await
            .map_err(|_| TranscodeError::PlaylistUnreadable(playlist_path.to_path_buf()))?;

        Ok(ConversionResult {
            success: true,
            playlist_path: playlist_path.to_path_buf(),
            stream_dir: stream_dir.to_path_buf(),
            segments: parse_segments(&text),
            exit_code,
            log_lines,
        })
    }
}
