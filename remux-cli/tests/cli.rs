use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use mp4::test_support::{FragmentBuilder, sample_payload};
use tempfile::TempDir;

fn aacts(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_aacts"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run aacts")
}

fn write_input(dir: &Path, builder: FragmentBuilder) -> String {
    let path = dir.join("audio.mp4");
    fs::write(&path, builder.build()).unwrap();
    path.to_string_lossy().into_owned()
}

fn scenario_a() -> FragmentBuilder {
    FragmentBuilder::new(44100)
        .sample(&sample_payload(100, 1))
        .sample(&sample_payload(120, 2))
        .sample(&sample_payload(90, 3))
}

#[test]
fn remux_writes_outputs_next_to_input() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), scenario_a());

    let output = aacts(&["remux", &input]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let aac = fs::read(dir.path().join("audio.aac")).unwrap();
    assert_eq!(aac.len(), 331);
    assert_eq!(&aac[..2], &[0xFF, 0xF1]);

    let ts_bytes = fs::read(dir.path().join("audio.ts")).unwrap();
    let contents = ts::read_ts(&ts_bytes).unwrap();
    assert_eq!(contents.pes.len(), 3);
}

#[test]
fn remux_honours_explicit_paths() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), scenario_a());
    let ts_path = dir.path().join("custom.ts");
    let aac_path = dir.path().join("custom.aac");

    let output = aacts(&[
        "-q",
        "remux",
        &input,
        "--ts-output",
        ts_path.to_str().unwrap(),
        "--aac-output",
        aac_path.to_str().unwrap(),
        "--queue-capacity",
        "1",
    ]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert_eq!(fs::metadata(&aac_path).unwrap().len(), 331);
    assert!(!dir.path().join("audio.ts").exists());
}

#[test]
fn remux_failure_exits_with_one() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        dir.path(),
        FragmentBuilder::new(44100)
            .sample(&[0; 100])
            .mdat(vec![0; 90]),
    );

    let output = aacts(&["remux", &input]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SampleSizeMismatch"), "stderr: {stderr}");
    // outputs were opened before the failure and are left in place
    assert_eq!(fs::metadata(dir.path().join("audio.aac")).unwrap().len(), 0);
}

#[test]
fn missing_input_exits_with_one() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.mp4");
    let output = aacts(&["remux", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn inspect_prints_tree_and_summary() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), scenario_a());

    let output = aacts(&["inspect", &input]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[moov]"));
    assert!(stdout.contains("    [trun]"));
    assert!(stdout.contains("timescale:        44100"));
    assert!(stdout.contains("samples:          3"));
}

#[test]
fn remux_rejects_pid_colliding_with_pmt_pid() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), scenario_a());

    let output = aacts(&["remux", &input, "--pid", "0x1000"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("PMT PID"));
    assert!(!dir.path().join("audio.ts").exists());
}

#[test]
fn remux_applies_stream_id_and_pmt_pid() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), scenario_a());

    let output = aacts(&[
        "-q",
        "remux",
        &input,
        "--stream-id",
        "0xC1",
        "--pmt-pid",
        "0x0100",
        "--pid",
        "0x0101",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let ts_bytes = fs::read(dir.path().join("audio.ts")).unwrap();
    let contents = ts::read_ts(&ts_bytes).unwrap();
    assert_eq!(contents.pes.len(), 3);
    assert!(
        contents
            .pes
            .iter()
            .all(|pes| pes.pid == 0x0101 && pes.header.stream_id == 0xC1)
    );
}
