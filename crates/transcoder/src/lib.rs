pub mod invoke;
pub mod playlist;

use std::path::PathBuf;
use thiserror::Error;

pub use invoke::{ConversionResult, TranscodeInvoker};

#[derive(Error, Debug)]
pub enum TranscodeError {
    /// The transcoder binary could not be started at all. Distinct from a
    /// nonzero exit: no diagnostic output exists in this case.
    #[error("failed to launch transcoder {path}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The process reported success but the playlist could not be read.
    #[error("playlist unreadable after successful transcode: {0}")]
    PlaylistUnreadable(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Global transcoder configuration.
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    pub ffmpeg_path: PathBuf,
    /// Target segment duration passed as `-hls_time`.
    pub segment_secs: u32,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            segment_secs: 9,
        }
    }
}
