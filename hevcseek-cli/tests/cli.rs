use std::process::Command;

use assert_cmd::prelude::*;
use hevcseek_core::{Frame, Writer, WriterOptions};
use predicates::prelude::*;

fn sample_file(frames: usize) -> tempfile::TempPath {
    let path = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap().into_temp_path();
    let mut writer = Writer::open(&path, 32, 24, 25, WriterOptions::default()).expect("open writer");
    for _ in 0..frames {
        let frame = Frame::Rgb24 {
            width:  32,
            height: 24,
            data:   vec![0u8; 32 * 24 * 3],
        };
        writer.write(&frame).expect("write frame");
    }
    writer.close().expect("close writer");
    path
}

#[test]
fn info_reports_frame_count_and_dimensions() {
    let path = sample_file(5);
    let mut cmd = Command::cargo_bin("hevcseek").unwrap();
    cmd.arg("info").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("frame_count: 5"))
        .stdout(predicate::str::contains("width:       32"))
        .stdout(predicate::str::contains("height:      24"));
}

#[test]
fn info_on_missing_file_fails() {
    let mut cmd = Command::cargo_bin("hevcseek").unwrap();
    cmd.arg("info").arg("/no/such/file-really-does-not-exist.mp4");
    cmd.assert().failure();
}

#[test]
fn extract_requires_index_or_range() {
    let path = sample_file(3);
    let out = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("hevcseek").unwrap();
    cmd.arg("extract").arg(&path).arg("--out").arg(out.path());
    cmd.assert().failure().stderr(predicate::str::contains("--index or --range"));
}

#[test]
fn extract_dumps_one_frame_as_raw_bytes() {
    let path = sample_file(3);
    let out = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("hevcseek").unwrap();
    cmd.arg("extract").arg(&path).arg("--index").arg("2").arg("--out").arg(out.path()).arg("--rgb");
    cmd.assert().success();

    let dumped = out.path().join("frame_000002.rgb");
    let bytes = std::fs::read(&dumped).expect("dumped frame exists");
    assert_eq!(bytes.len(), 32 * 24 * 3);
}

#[test]
fn encode_rejects_mismatched_frame_size() {
    let frames_dir = tempfile::tempdir().unwrap();
    std::fs::write(frames_dir.path().join("frame_000000.gray"), vec![0u8; 4]).unwrap();
    let out = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap().into_temp_path();

    let mut cmd = Command::cargo_bin("hevcseek").unwrap();
    cmd.arg("encode")
        .arg(frames_dir.path())
        .arg("--out")
        .arg(&out)
        .arg("--width")
        .arg("32")
        .arg("--height")
        .arg("24")
        .arg("--fps")
        .arg("25")
        .arg("--gray");
    cmd.assert().failure().stderr(predicate::str::contains("expected"));
}
