#![cfg(feature = "cli")]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use gifstream::codec::{GifWriter, GraphicControl, ImageDescriptor, Palette};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "gifstream-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

/// Two 2x2 frames: red/green checker, then blue with a transparent corner
/// that keeps the first frame's red. Loops forever.
fn write_fixture(dir: &Path) -> PathBuf {
    let palette = Palette::from_rgb([[255, 0, 0], [0, 255, 0], [0, 0, 255], [0, 0, 0]])
        .expect("palette");
    let bytes = GifWriter::with_global_palette(2, 2, &palette)
        .loop_count(0)
        .comment("fixture")
        .graphic_control(GraphicControl::default().with_delay(1))
        .image(ImageDescriptor::new(0, 0, 2, 2), None, &[0, 1, 1, 0], 2)
        .expect("first frame")
        .graphic_control(GraphicControl::default().with_delay(1).with_transparent(3))
        .image(ImageDescriptor::new(0, 0, 2, 2), None, &[2, 2, 2, 3], 2)
        .expect("second frame")
        .finish();
    let path = dir.join("fixture.gif");
    std::fs::write(&path, &bytes).expect("fixture should be writable");
    path
}

fn gifstream(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gifstream"))
        .args(args)
        .output()
        .expect("binary should run")
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("stdout line should be JSON"))
        .collect()
}

#[test]
fn inspect_prints_summary_as_json() {
    let dir = unique_temp_dir("inspect");
    let fixture = write_fixture(&dir);

    let output = gifstream(&["--format", "json", "inspect", fixture.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 1);
    let report = &lines[0];
    assert_eq!(report["ok"], true);
    assert_eq!(report["frames_delivered"], 2);
    assert_eq!(report["summary"]["version"], "89a");
    assert_eq!(report["summary"]["width"], 2);
    assert_eq!(report["summary"]["frames"], 2);
    assert_eq!(report["summary"]["loop_count"], 0);
    assert_eq!(report["summary"]["extensions_skipped"], 1);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn inspect_missing_file_is_a_transport_error() {
    let dir = unique_temp_dir("missing");
    let missing = dir.join("nope.gif");

    let output = gifstream(&["--format", "json", "inspect", missing.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(3));
    let lines = json_lines(&output);
    assert_eq!(lines[0]["ok"], false);
    assert_eq!(lines[0]["error_kind"], "open_failed");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn inspect_corrupt_stream_is_data_invalid() {
    let dir = unique_temp_dir("corrupt");
    let palette = Palette::from_rgb([[0, 0, 0], [255, 255, 255]]).expect("palette");
    let bytes = GifWriter::with_global_palette(1, 1, &palette)
        .raw(&[0x42])
        .into_bytes();
    let path = dir.join("corrupt.gif");
    std::fs::write(&path, &bytes).expect("fixture should be writable");

    let output = gifstream(&["--format", "json", "inspect", path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(60));
    let lines = json_lines(&output);
    assert_eq!(lines[0]["error_kind"], "unknown_block_tag");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn play_prints_frames_and_dumps_ppm() {
    let dir = unique_temp_dir("play");
    let fixture = write_fixture(&dir);
    let dump = dir.join("frames");

    let output = gifstream(&[
        "--format",
        "json",
        "play",
        fixture.to_str().unwrap(),
        "--sessions",
        "1",
        "--no-delays",
        "--dump-dir",
        dump.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let lines = json_lines(&output);
    let frames: Vec<_> = lines.iter().filter(|l| l["event"] == "frame").collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["frame"], 1);
    assert_eq!(frames[0]["opaque_pixels"], 4);
    assert_eq!(frames[1]["opaque_pixels"], 4);
    assert_ne!(frames[0]["checksum"], frames[1]["checksum"]);
    let ended: Vec<_> = lines
        .iter()
        .filter(|l| l["event"] == "session_ended")
        .collect();
    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0]["completed"], true);

    let mut dumped: Vec<_> = std::fs::read_dir(&dump)
        .expect("dump dir exists")
        .map(|entry| entry.expect("entry").path())
        .collect();
    dumped.sort();
    assert_eq!(dumped.len(), 2);
    let first = std::fs::read(&dumped[0]).expect("ppm readable");
    assert!(first.starts_with(b"P6\n2 2\n255\n"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn play_stops_after_frame_limit() {
    let dir = unique_temp_dir("limit");
    let fixture = write_fixture(&dir);

    let output = gifstream(&[
        "--format",
        "json",
        "play",
        fixture.to_str().unwrap(),
        "--frames",
        "3",
        "--restart-delay",
        "0",
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let frames = json_lines(&output)
        .into_iter()
        .filter(|l| l["event"] == "frame")
        .count();
    assert_eq!(frames, 3);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn play_reports_why_nothing_played() {
    let dir = unique_temp_dir("noplay");
    let missing = dir.join("nope.gif");

    let output = gifstream(&[
        "--format",
        "json",
        "play",
        missing.to_str().unwrap(),
        "--sessions",
        "2",
        "--restart-delay",
        "0",
    ]);

    assert_eq!(output.status.code(), Some(3));
    let ended = json_lines(&output)
        .into_iter()
        .filter(|l| l["event"] == "session_ended")
        .count();
    assert_eq!(ended, 2);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn version_prints_package_version() {
    let output = gifstream(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("gifstream {}", env!("CARGO_PKG_VERSION")));
}
