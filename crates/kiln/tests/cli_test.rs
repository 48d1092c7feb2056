use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// kiln.yaml を持つテスト用プロジェクトを作成
fn project_with_manifest(content: &str) -> TempDir {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("kiln.yaml"), content).unwrap();
    root
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("version"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kiln"));
}

/// buildコマンドのヘルプが正しく表示されることを確認
#[test]
fn test_build_help() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("build")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-cache"))
        .stdout(predicate::str::contains("--build-arg"))
        .stdout(predicate::str::contains("--cleanup"));
}

/// validateコマンドが有効なマニフェストを受理することを確認
#[test]
fn test_validate_accepts_valid_manifest() {
    let project = project_with_manifest(
        r#"
name: shop
images:
  - name: ghcr.io/org/shop-api:v1.0
  - name: shop-web:latest
"#,
    );

    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.current_dir(project.path())
        .env("KILN_PROJECT_ROOT", project.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("マニフェストは有効です"));
}

/// validateコマンドが無効なイメージ参照を拒否することを確認
#[test]
fn test_validate_rejects_invalid_reference() {
    let project = project_with_manifest("images:\n  - name: Bad/Name\n");

    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.current_dir(project.path())
        .env("KILN_PROJECT_ROOT", project.path())
        .arg("validate")
        .assert()
        .failure();
}
