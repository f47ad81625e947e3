use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tempfile::tempdir;

/// Write an executable stand-in for MDXfind.
#[cfg(unix)]
fn fake_engine(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("mdxfind");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn write_hashlist(dir: &Path) -> PathBuf {
    let path = dir.join("list.txt");
    fs::write(
        &path,
        "5f4dcc3b5aa765d61d8327deb882cf99\n\n5192d8813bbef9b620dd91a757834dc2:vl1A*)\ne10adc3949ba59abbe56e057f20f883e:salt:123456\n",
    )
    .unwrap();
    path
}

fn mdxrun() -> Command {
    let mut cmd = Command::cargo_bin("mdxrun").unwrap();
    cmd.arg("--color").arg("never");
    cmd
}

#[cfg(unix)]
#[test]
fn e2e_wordlist_job_streams_normalized_results() {
    let tmp = tempdir().unwrap();
    let list = write_hashlist(tmp.path());
    let words = tmp.path().join("words.txt");
    fs::write(&words, "password\nzhurA123\n").unwrap();
    let engine = fake_engine(
        tmp.path(),
        r#"printf '%s\n' "$@" > "$0.args"
echo "Working on hash types: MD5x01 MD5SALT"
echo "MD5x01 5f4dcc3b5aa765d61d8327deb882cf99:password"
echo "MD5SALT 5192d8813bbef9b620dd91a757834dc2:vl1A*):zhurA123" >&2
printf 'MD5x01 e10adc3949ba59abbe56e057f20f883e:123456'"#,
    );

    let output = mdxrun()
        .arg("--engine")
        .arg(&engine)
        .arg("--type")
        .arg("2")
        .arg("--attack")
        .arg(&words)
        .arg("--hashlist")
        .arg(&list)
        .arg("--skip")
        .arg("10")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "5f4dcc3b5aa765d61d8327deb882cf99:password:MD5x01\n\
         5192d8813bbef9b620dd91a757834dc2:zhurA123:MD5SALT\n\
         e10adc3949ba59abbe56e057f20f883e:123456:MD5x01\n\
         STATUS 10000 0\n"
    );

    let hashes = fs::read_to_string(tmp.path().join("list.txt.hashes")).unwrap();
    let salts = fs::read_to_string(tmp.path().join("list.txt.salts")).unwrap();
    assert_eq!(hashes.lines().count(), 3);
    assert_eq!(salts, "\nvl1A*)\nsalt\n");

    let args = fs::read_to_string(tmp.path().join("mdxfind.args")).unwrap();
    let expected = [
        "-h".to_string(),
        "ALL,!user,salt".to_string(),
        "-i".to_string(),
        "10".to_string(),
        "-q".to_string(),
        "10".to_string(),
        "-f".to_string(),
        tmp.path().join("list.txt.hashes").display().to_string(),
        "-s".to_string(),
        tmp.path().join("list.txt.salts").display().to_string(),
        "-e".to_string(),
        words.display().to_string(),
        "-w".to_string(),
        "10".to_string(),
    ];
    assert_eq!(args.lines().collect::<Vec<_>>(), expected);
}

#[cfg(unix)]
#[test]
fn e2e_timeout_stops_engine_with_single_status() {
    let tmp = tempdir().unwrap();
    let list = write_hashlist(tmp.path());
    let engine = fake_engine(
        tmp.path(),
        "echo 'MD5x01 5f4dcc3b5aa765d61d8327deb882cf99:password'\nexec sleep 30",
    );

    let started = Instant::now();
    let output = mdxrun()
        .arg("--engine")
        .arg(&engine)
        .arg("--hashlist")
        .arg(&list)
        .arg("--length")
        .arg("4")
        .arg("--timeout")
        .arg("1")
        .output()
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(20));
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "5f4dcc3b5aa765d61d8327deb882cf99:password:MD5x01");
    let statuses: Vec<&&str> = lines.iter().filter(|l| l.starts_with("STATUS ")).collect();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].starts_with("STATUS 2500 "));
    assert!(!stdout.contains("STATUS 10000 0"));
}

#[cfg(unix)]
#[test]
fn e2e_identify_job_omits_wordlist() {
    let tmp = tempdir().unwrap();
    let list = write_hashlist(tmp.path());
    let engine = fake_engine(tmp.path(), r#"printf '%s\n' "$@" > "$0.args""#);

    mdxrun()
        .arg("--engine")
        .arg(&engine)
        .arg("--hashlist")
        .arg(&list)
        .arg("--hash-type")
        .arg("MD5x01")
        .arg("--iterations")
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::eq("STATUS 10000 0\n"));

    let args = fs::read_to_string(tmp.path().join("mdxfind.args")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(args[..2], ["-h", "MD5x01"]);
    assert_eq!(args.last(), Some(&"-e"));
    assert!(!args.contains(&"-i"));
}

#[test]
fn missing_hashlist_causes_non_zero_exit() {
    let tmp = tempdir().unwrap();
    mdxrun()
        .arg("--hashlist")
        .arg(tmp.path().join("missing.txt"))
        .assert()
        .code(3)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("hashlist file does not exist"));
}

#[test]
fn unknown_attack_type_is_rejected() {
    let tmp = tempdir().unwrap();
    let list = write_hashlist(tmp.path());
    mdxrun()
        .arg("--type")
        .arg("5")
        .arg("--hashlist")
        .arg(&list)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid attack type: 5"));
}

#[test]
fn mask_attack_fails_fast() {
    let tmp = tempdir().unwrap();
    let list = write_hashlist(tmp.path());
    mdxrun()
        .arg("--type")
        .arg("1")
        .arg("--attack")
        .arg("?l?l?l?l")
        .arg("--hashlist")
        .arg(&list)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("not supported"));
    assert!(!tmp.path().join("list.txt.hashes").exists());
}

#[test]
fn wordlist_attack_without_input_is_rejected() {
    let tmp = tempdir().unwrap();
    let list = write_hashlist(tmp.path());
    mdxrun()
        .arg("--type")
        .arg("2")
        .arg("--hashlist")
        .arg(&list)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("requires an attack input"));
}

#[test]
fn missing_wordlist_file_is_rejected() {
    let tmp = tempdir().unwrap();
    let list = write_hashlist(tmp.path());
    mdxrun()
        .arg("--type")
        .arg("2")
        .arg("--attack")
        .arg(tmp.path().join("nope.txt"))
        .arg("--hashlist")
        .arg(&list)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("wordlist file does not exist"));
}

#[test]
fn missing_engine_causes_non_zero_exit() {
    let tmp = tempdir().unwrap();
    let list = write_hashlist(tmp.path());
    mdxrun()
        .arg("--engine")
        .arg(tmp.path().join("no-mdxfind"))
        .arg("--hashlist")
        .arg(&list)
        .assert()
        .code(5)
        .stderr(predicate::str::contains("MDXfind executable not found"));
    assert!(!tmp.path().join("list.txt.hashes").exists());
}
