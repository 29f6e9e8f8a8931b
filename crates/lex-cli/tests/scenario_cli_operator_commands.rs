//! Scenario: operator CLI against temp files only (no network).
//!
//! # Invariants under test
//!
//! 1. `config-hash` is independent of YAML key order.
//! 2. Secret-looking literals abort the load; unused keys only warn.
//! 3. `subs list` prints well-formed entries and skips hand-edited junk.
//! 4. `mirror status` on a fresh database reports empty tables and no watermark.

use std::path::Path;

use predicates::prelude::*;

fn lex(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("lex").unwrap();
    cmd.current_dir(dir)
        .env_remove("LEX_CONFIG")
        .env_remove("LEX_MIRROR_URL");
    cmd
}

fn hash_line(out: &[u8]) -> String {
    String::from_utf8_lossy(out)
        .lines()
        .find(|l| l.starts_with("config_hash="))
        .expect("config_hash line")
        .to_string()
}

#[test]
fn config_hash_ignores_key_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let a = dir.path().join("a.yaml");
    let b = dir.path().join("b.yaml");
    std::fs::write(&a, "paging:\n  page_size: 10\n  lookup_limit: 3\ndaemon:\n  addr: 0.0.0.0:1\n")?;
    std::fs::write(&b, "daemon:\n  addr: 0.0.0.0:1\npaging:\n  lookup_limit: 3\n  page_size: 10\n")?;

    let out_a = lex(dir.path()).arg("config-hash").arg(&a).output()?;
    let out_b = lex(dir.path()).arg("config-hash").arg(&b).output()?;
    assert!(out_a.status.success());
    assert!(out_b.status.success());
    assert_eq!(hash_line(&out_a.stdout), hash_line(&out_b.stdout));
    Ok(())
}

#[test]
fn config_hash_refuses_secrets_and_warns_on_unused_keys() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let secret = dir.path().join("secret.yaml");
    std::fs::write(&secret, "news:\n  source_url: ghp_0123456789abcdef\n")?;
    lex(dir.path())
        .arg("config-hash")
        .arg(&secret)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"));

    let typo = dir.path().join("typo.yaml");
    std::fs::write(&typo, "paging:\n  page_size: 10\nbot:\n  token_path: x\n")?;
    lex(dir.path())
        .arg("config-hash")
        .arg(&typo)
        .assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stderr(predicate::str::contains("unused config key: /bot/token_path"));
    Ok(())
}

#[test]
fn subs_list_skips_malformed_lines() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let subs = dir.path().join("subscribers.txt");
    std::fs::write(&subs, "100-09:30\njunk line\n-200-21:05\n")?;
    let cfg = dir.path().join("lex.yaml");
    std::fs::write(
        &cfg,
        format!("storage:\n  subscribers_path: {}\n", subs.display()),
    )?;

    lex(dir.path())
        .arg("--config")
        .arg(&cfg)
        .args(["subs", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("100 09:30"))
        .stdout(predicate::str::contains("-200 21:05"))
        .stdout(predicate::str::contains("total=2"))
        .stdout(predicate::str::contains("junk").not());
    Ok(())
}

#[test]
fn mirror_status_on_fresh_database() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let fields = dir.path().join("fields.txt");
    std::fs::write(
        &fields,
        "pl_name:Planet Name\ndisc_year:Discovery Year\ndefault_flag:Default Parameter Set~\n",
    )?;
    let db = dir.path().join("archive").join("mirror.db");
    let cfg = dir.path().join("lex.yaml");
    std::fs::write(
        &cfg,
        format!(
            "mirror:\n  database_url: sqlite://{}\n  fields_path: {}\n",
            db.display(),
            fields.display()
        ),
    )?;

    lex(dir.path())
        .arg("--config")
        .arg(&cfg)
        .args(["mirror", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("observations=0"))
        .stdout(predicate::str::contains("composite=0"))
        .stdout(predicate::str::contains("watermark=NONE"));
    assert!(db.exists());
    Ok(())
}
