#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use vodserve_transcoder::{TranscodeError, TranscodeInvoker, TranscoderConfig};

/// Write an executable stub standing in for the transcoder binary.
fn write_stub(dir: &PathBuf, body: &str) -> PathBuf {
    let path = dir.join("ffmpeg-stub");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vs_tc_{name}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn invoker(ffmpeg_path: PathBuf) -> TranscodeInvoker {
    TranscodeInvoker::new(TranscoderConfig {
        ffmpeg_path,
        ..Default::default()
    })
}

#[tokio::test]
async fn successful_run_parses_playlist() {
    let dir = test_dir("ok");
    // The playlist path is the stub's last argument.
    let stub = write_stub(
        &dir,
        r#"for last; do :; done
printf '#EXTM3U\n#EXT-X-VERSION:3\n1.ts\n2.ts\n#EXT-X-ENDLIST\n' > "$last"
echo 'frame=  100 fps=25' >&2
exit 0"#,
    );

    let playlist = dir.join("playlist.m3u8");
    let result = invoker(stub)
        .invoke(&dir.join("video.mp4"), &playlist, &dir)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.segments, vec!["1.ts", "2.ts"]);
    assert!(result.log_lines.iter().any(|l| l.contains("frame=")));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn nonzero_exit_reports_failure_without_reading_playlist() {
    let dir = test_dir("fail");
    let stub = write_stub(&dir, "echo 'No such file or directory' >&2\nexit 1");

    // No playlist file exists; the parse step must be skipped, not crash.
    let result = invoker(stub)
        .invoke(&dir.join("video.mp4"), &dir.join("playlist.m3u8"), &dir)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.exit_code, Some(1));
    assert!(result.segments.is_empty());
    assert!(!result.log_lines.is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn missing_binary_is_a_launch_failure() {
    let dir = test_dir("launch");

    let err = invoker(dir.join("no-such-binary"))
        .invoke(&dir.join("video.mp4"), &dir.join("playlist.m3u8"), &dir)
        .await
        .unwrap_err();

    assert!(matches!(err, TranscodeError::Launch { .. }));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn cancellation_kills_the_process() {
    let dir = test_dir("cancel");
    let stub = write_stub(&dir, "sleep 30");

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let result = invoker(stub)
        .invoke_with_cancel(
            &dir.join("video.mp4"),
            &dir.join("playlist.m3u8"),
            &dir,
            cancel,
        )
        .await
        .unwrap();

    assert!(!result.success);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn trailing_stderr_is_fully_captured() {
    let dir = test_dir("drain");
    // Burst of output right before exit must all land in log_lines.
    let stub = write_stub(
        &dir,
        r#"i=1
while [ $i -le 50 ]; do echo "line $i" >&2; i=$((i+1)); done
exit 1"#,
    );

    let result = invoker(stub)
        .invoke(&dir.join("video.mp4"), &dir.join("playlist.m3u8"), &dir)
        .await
        .unwrap();

    assert_eq!(result.log_lines.len(), 50);
    assert_eq!(result.log_lines[0], "line 1");
    assert_eq!(result.log_lines[49], "line 50");

    std::fs::remove_dir_all(&dir).ok();
}
