use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const QUAD_OBJ: &str = "\
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

fn media_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("temp media dir");
    fs::write(dir.path().join("cube.obj"), QUAD_OBJ).expect("write cube.obj");
    dir
}

fn demos() -> Command {
    let mut cmd = Command::cargo_bin("render-demos").expect("binary exists");
    cmd.env_remove("RENDER_DEMOS_MEDIA");
    cmd
}

#[test]
fn list_prints_every_demo() {
    demos()
        .arg("--list")
        .assert()
        .success()
        .stdout(contains("mipmap\tMipmap"))
        .stdout(contains("normal-map\tNormal map"))
        .stdout(contains("pbr\tPBR"))
        .stdout(contains("ibl\tIBL"))
        .stdout(contains("skybox\t"))
        .stdout(contains("texture-3d\tTexture 3D"));
}

#[test]
fn summary_uses_the_media_directory() {
    let media = media_dir();
    demos()
        .arg("--summary-only")
        .arg("--media")
        .arg(media.path())
        .assert()
        .success()
        .stdout(contains(" - skybox: 6 vertices at 0"))
        .stdout(contains(" - corridor: 24 vertices at 0"))
        .stdout(contains("Texture 3D (texture-3d): 36 vertices"));
}

#[test]
fn summary_falls_back_to_generated_skybox() {
    let media = tempfile::tempdir().expect("temp media dir");
    demos()
        .args(["--summary-only", "--media"])
        .arg(media.path())
        .assert()
        .success()
        .stdout(contains(" - skybox: 36 vertices at 0"));
}

#[test]
fn rejects_unknown_demo() {
    demos()
        .args(["--demo", "raymarcher", "--list"])
        .assert()
        .failure()
        .stderr(contains("Unknown demo 'raymarcher'"));
}

#[test]
fn rejects_unknown_flags_with_usage() {
    demos()
        .arg("--fullscreen")
        .assert()
        .failure()
        .stderr(contains("Usage: render-demos").and(contains("--fullscreen")));
}
