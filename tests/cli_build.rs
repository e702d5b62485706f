use assert_cmd::prelude::*;
use std::process::Command;

#[test]
fn command_build_tree() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("pangene")?;
    let output = cmd
        .arg("build")
        .arg("tests/data/toy.fa")
        .arg("--tree")
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;

    assert!(stdout.contains("BuildPangenome"));
    assert!(stdout.contains("AnchorFinder"));
    assert!(stdout.contains("Joiner"));
    assert!(stdout.contains("CheckNoOverlaps"));

    Ok(())
}

#[test]
fn command_build_toy_pangenome() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("pangenome.bs");

    let mut cmd = Command::cargo_bin("pangene")?;
    let output = cmd
        .arg("build")
        .arg("tests/data/toy.fa")
        .arg("--set")
        .arg("ANCHOR_SIZE=9")
        .arg("--set")
        .arg("MIN_LENGTH=9")
        .arg("--opt")
        .arg("max-errors=0")
        .arg("--opt")
        .arg("batch=10")
        .arg("--opt")
        .arg("min-distance=2")
        .arg("-o")
        .arg(out.to_str().unwrap())
        .output()?;
    let stderr = String::from_utf8(output.stderr)?;
    assert!(output.status.success(), "stderr: {}", stderr);

    // the shared 40 bp core must survive as a two-genome block
    let mut cmd = Command::cargo_bin("pangene")?;
    let output = cmd.arg("stat").arg(out.to_str().unwrap()).output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;

    let field = |name: &str| -> i64 {
        stdout
            .lines()
            .find(|l| l.starts_with(name))
            .and_then(|l| l.split('\t').nth(1))
            .and_then(|v| v.parse().ok())
            .unwrap_or(-1)
    };
    assert_eq!(field("sequences"), 2);
    assert_eq!(field("genomes"), 2);
    assert!(field("blocks") >= 1, "stat: {}", stdout);
    assert!(field("stem blocks") >= 1, "stat: {}", stdout);

    Ok(())
}

#[test]
fn command_build_workers_agree() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let single = dir.path().join("single.bs");
    let multi = dir.path().join("multi.bs");

    for (out, workers) in [(&single, "1"), (&multi, "4")] {
        let mut cmd = Command::cargo_bin("pangene")?;
        let output = cmd
            .arg("build")
            .arg("tests/data/toy.fa")
            .arg("--set")
            .arg("ANCHOR_SIZE=9")
            .arg("--set")
            .arg("MIN_LENGTH=9")
            .arg("--opt")
            .arg("max-errors=0")
            .arg("--opt")
            .arg("batch=10")
            .arg("--workers")
            .arg(workers)
            .arg("-o")
            .arg(out.to_str().unwrap())
            .output()?;
        assert!(output.status.success());
    }
    let a = std::fs::read_to_string(&single)?;
    let b = std::fs::read_to_string(&multi)?;
    assert_eq!(a, b, "parallel runs must be deterministic");

    Ok(())
}

#[test]
fn command_build_consensus_output() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("pangenome.bs");

    let mut cmd = Command::cargo_bin("pangene")?;
    cmd.arg("build")
        .arg("tests/data/toy.fa")
        .arg("--set")
        .arg("ANCHOR_SIZE=9")
        .arg("--set")
        .arg("MIN_LENGTH=9")
        .arg("--opt")
        .arg("max-errors=0")
        .arg("--opt")
        .arg("batch=10")
        .arg("-o")
        .arg(out.to_str().unwrap())
        .assert()
        .success();

    let mut cmd = Command::cargo_bin("pangene")?;
    let output = cmd
        .arg("stat")
        .arg(out.to_str().unwrap())
        .arg("--consensus")
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with('>'));
    assert!(stdout.lines().count() >= 2);

    Ok(())
}
