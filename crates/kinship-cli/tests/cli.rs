use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const ANN: &str = "---\nUID: ann\nFN: Ann\nGENDER: F\nRELATED[child]: local-id:bob\n---\n# Ann\n";
const BOB: &str = "---\nUID: bob\nFN: Bob\n---\n# Bob\n";

fn vault() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("Ann.md"), ANN).unwrap();
    std::fs::write(dir.path().join("Bob.md"), BOB).unwrap();
    dir
}

fn kinship(vault: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kinship").unwrap();
    cmd.arg("--vault")
        .arg(vault)
        .arg("--config")
        .arg(vault.join(".kinship.toml"))
        .env_remove("RUST_LOG");
    cmd
}

fn read(vault: &Path, name: &str) -> String {
    std::fs::read_to_string(vault.join(name)).unwrap()
}

#[test]
fn test_sync_writes_reciprocals() {
    let dir = vault();
    kinship(dir.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced"));

    let bob = read(dir.path(), "Bob.md");
    assert!(bob.contains("RELATED[parent]: local-id:ann\n"), "{bob}");
    assert!(bob.contains("- mother [[Ann]]"), "{bob}");
    assert!(read(dir.path(), "Ann.md").contains("- child [[Bob]]"));
}

#[test]
fn test_check_fails_until_fixed() {
    let dir = vault();
    kinship(dir.path())
        .args(["--format", "json", "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("missing_reciprocals"))
        .stdout(predicate::str::contains("Bob.md"));

    kinship(dir.path())
        .arg("fix")
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 1 reciprocal(s)"));

    kinship(dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("No problems found."));
}

#[test]
fn test_curate_single_document() {
    let dir = vault();
    kinship(dir.path())
        .args(["curate", "Ann.md", "--trigger", "improvement"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Curated 1 document(s) (improvement run)"));

    // fan-out reached the peer
    assert!(read(dir.path(), "Bob.md").contains("RELATED[parent]: local-id:ann"));
}

#[test]
fn test_graph_vcard_lines() {
    let dir = vault();
    kinship(dir.path())
        .args(["graph", "Ann.md", "--vcard"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RELATED;TYPE=child:local-id:bob"));
}

#[test]
fn test_config_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");

    Command::cargo_bin("kinship")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "processors.gender_render_processor", "off"])
        .assert()
        .success();

    Command::cargo_bin("kinship")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["config", "get", "processors.gender_render_processor"])
        .assert()
        .success()
        .stdout("false\n");

    Command::cargo_bin("kinship")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "processors.nope", "on"])
        .assert()
        .failure();
}

#[test]
fn test_missing_vault_is_reported() {
    let dir = TempDir::new().unwrap();
    kinship(&dir.path().join("missing"))
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Vault not found"));
}

#[test]
fn test_completions_generate() {
    Command::cargo_bin("kinship")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kinship"));
}
