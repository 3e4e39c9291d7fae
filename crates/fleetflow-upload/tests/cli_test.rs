#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

const PROJECT: &str = r#"
bucket "assets.example.com" {
    region "eu-west-1"
}

bucket-upload "site" {
    bucket "assets.example.com"
    source "./public"
    prefix "site/"
    region "eu-west-1"
}
"#;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("fleet-upload").unwrap();
    cmd.env_remove("FLEET_UPLOAD_FILE")
        .env_remove("FLEET_UPLOAD_ENDPOINT");
    cmd
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("down"))
        .stdout(predicate::str::contains("--file"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fleet-upload"));
}

/// upコマンドのヘルプに--checkが含まれることを確認
#[test]
fn test_up_help() {
    cmd()
        .arg("up")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--check"))
        .stdout(predicate::str::contains("--no-progress"));
}

/// 不正なコマンドでエラーになることを確認
#[test]
fn test_invalid_command() {
    cmd().arg("invalid-command").assert().failure();
}

/// プロジェクトファイルがない場合はエラー
#[test]
fn test_plan_without_project() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("fleet.kdl"));
}

/// planは状態ファイルがなければ作成を表示する（ネットワーク不要）
#[test]
fn test_plan_shows_create() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fleet.kdl"), PROJECT).unwrap();

    cmd()
        .current_dir(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("site"))
        .stdout(predicate::str::contains("1 to create"));

    assert!(!dir.path().join(".fleetflow/state.json").exists());
}

/// --file と環境変数でプロジェクトファイルを指定できる
#[test]
fn test_plan_with_file_override() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("uploads.kdl");
    fs::write(&file, PROJECT).unwrap();

    cmd()
        .arg("--file")
        .arg(&file)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 to create"));

    cmd()
        .env("FLEET_UPLOAD_FILE", &file)
        .arg("plan")
        .arg("site")
        .assert()
        .success();
}

/// 存在しないアップロード名はエラー
#[test]
fn test_plan_unknown_upload() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fleet.kdl"), PROJECT).unwrap();

    cmd()
        .current_dir(dir.path())
        .arg("plan")
        .arg("docs")
        .assert()
        .failure()
        .stderr(predicate::str::contains("docs"));
}

/// downは--yesなしでは何も削除しない
#[test]
fn test_down_requires_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fleet.kdl"), PROJECT).unwrap();

    cmd()
        .current_dir(dir.path())
        .arg("down")
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
}

const ORPHAN_STATE: &str = r#"{
  "version": 1,
  "updated_at": "2026-01-01T00:00:00Z",
  "resources": {
    "s3-bucket-upload:old": {
      "id": "old",
      "resource_type": "s3-bucket-upload",
      "status": "up",
      "attributes": {
        "uploadId": "old",
        "bucketName": "legacy.example.com",
        "source": "./old",
        "prefix": "old/",
        "region": "eu-west-1"
      },
      "created_at": "2026-01-01T00:00:00Z",
      "updated_at": "2026-01-01T00:00:00Z"
    }
  }
}"#;

/// 状態ファイルにだけ残るアップロードも名前で削除対象にできる
#[test]
fn test_down_named_orphan() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fleet.kdl"), PROJECT).unwrap();
    fs::create_dir_all(dir.path().join(".fleetflow")).unwrap();
    fs::write(dir.path().join(".fleetflow/state.json"), ORPHAN_STATE).unwrap();

    cmd()
        .current_dir(dir.path())
        .arg("down")
        .arg("old")
        .assert()
        .success()
        .stdout(predicate::str::contains("old"))
        .stdout(predicate::str::contains("s3://legacy.example.com/old/"))
        .stdout(predicate::str::contains("--yes"));

    cmd()
        .current_dir(dir.path())
        .arg("down")
        .arg("missing")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
}
