//! CLI integration tests for gatehouse admin commands.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use gatehouse::auth::PasswordHasher;
use gatehouse::store::{CredentialStore, SqliteStore, Store};
use gatehouse::types::NewUser;
use predicates::prelude::*;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn db_path(&self) -> PathBuf {
        self.data_dir().join("gatehouse.db")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("gatehouse").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "admin",
                "init",
                "--data-dir",
                &self.data_dir_str(),
                "--non-interactive",
            ])
            .assert()
    }

    fn store(&self) -> SqliteStore {
        SqliteStore::new(self.db_path()).expect("failed to open store")
    }
}

#[test]
fn test_init_creates_root_admin() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Created root admin 'admin'"));

    let store = ctx.store();
    assert!(store.has_root_admin().unwrap());

    let user = store.find_user_by_username("admin").unwrap().unwrap();
    assert!(user.is_admin);
    assert!(user.is_root);
    assert!(
        PasswordHasher::new()
            .verify("password1234", &user.password_hash)
            .unwrap()
    );
}

#[test]
fn test_init_twice_fails() {
    let ctx = TestContext::new();

    ctx.init().success();
    ctx.init()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn test_init_uses_configured_admin() {
    let ctx = TestContext::new();
    let config = ctx.temp_dir.child("gatehouse.toml");
    config
        .write_str(
            r#"
admin_username = "ops"
admin_password = "a-much-better-password"
"#,
        )
        .unwrap();

    ctx.cmd()
        .args([
            "admin",
            "init",
            "--data-dir",
            &ctx.data_dir_str(),
            "--config",
            &config.path().to_string_lossy(),
            "--non-interactive",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created root admin 'ops'"));

    let store = ctx.store();
    assert!(store.find_user_by_username("admin").unwrap().is_none());
    let user = store.find_user_by_username("ops").unwrap().unwrap();
    assert!(user.is_root);
}

#[test]
fn test_init_rejects_unknown_config_keys() {
    let ctx = TestContext::new();
    let config = ctx.temp_dir.child("gatehouse.toml");
    config.write_str("admin_name = \"ops\"\n").unwrap();

    ctx.cmd()
        .args([
            "admin",
            "init",
            "--data-dir",
            &ctx.data_dir_str(),
            "--config",
            &config.path().to_string_lossy(),
            "--non-interactive",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn test_admin_username_held_by_non_root_blocks_startup() {
    let ctx = TestContext::new();
    let store = ctx.store();
    store.initialize().unwrap();
    store
        .insert_user(&NewUser {
            username: "admin".to_string(),
            password_hash: PasswordHasher::new().hash("someone-elses").unwrap(),
            is_admin: false,
            is_root: false,
        })
        .unwrap();
    drop(store);

    ctx.init()
        .failure()
        .stderr(predicate::str::contains("non-root"));

    ctx.cmd()
        .args(["serve", "--port", "0", "--data-dir", &ctx.data_dir_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("non-root"));

    assert!(!ctx.store().has_root_admin().unwrap());
}
