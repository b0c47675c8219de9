//! Integration tests for bundlegate

mod scenarios;

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated from the user's config, state and cache directories
    fn bundlegate(home: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("bundlegate");
        cmd.env("HOME", home)
            .env("XDG_CONFIG_HOME", home.join("config"))
            .env("XDG_STATE_HOME", home.join("state"))
            .env("XDG_DATA_HOME", home.join("data"))
            .env("BUNDLEGATE_CONFIG", home.join("bundlegate.toml"))
            .env("CI", "1");
        cmd
    }

    /// Config pointing at a port nothing listens on
    fn write_offline_config(home: &Path) {
        let config = format!(
            "[origin]\nbase_url = \"http://127.0.0.1:9\"\n\n[cache]\nroot = \"{}\"\nhash_root = \"{}\"\n",
            home.join("cache").display(),
            home.join("hashes").display(),
        );
        std::fs::write(home.join("bundlegate.toml"), config).unwrap();
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        bundlegate(home.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("web bundle cache"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        bundlegate(home.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("bundlegate"));
    }

    #[test]
    fn config_path_honors_env() {
        let home = TempDir::new().unwrap();
        bundlegate(home.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("bundlegate.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let home = TempDir::new().unwrap();
        bundlegate(home.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[origin]"))
            .stdout(predicate::str::contains("namespace_key"));
    }

    #[test]
    fn config_set_then_show() {
        let home = TempDir::new().unwrap();
        bundlegate(home.path())
            .args(["config", "set", "integrity.algorithm", "sha256"])
            .assert()
            .success();

        bundlegate(home.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("algorithm = \"sha256\""));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let home = TempDir::new().unwrap();
        bundlegate(home.path())
            .args(["config", "set", "origin.nope", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn status_without_manifest() {
        let home = TempDir::new().unwrap();
        write_offline_config(home.path());
        bundlegate(home.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No persisted manifest"));
    }

    #[test]
    fn status_json() {
        let home = TempDir::new().unwrap();
        write_offline_config(home.path());
        bundlegate(home.path())
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"total_bytes\": 0"));
    }

    #[test]
    fn get_without_manifest_fails() {
        let home = TempDir::new().unwrap();
        write_offline_config(home.path());
        bundlegate(home.path())
            .args(["get", "--offline", "/build/main.js"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("503"))
            .stderr(predicate::str::contains("not initialized"));
    }

    #[test]
    fn cache_list_empty() {
        let home = TempDir::new().unwrap();
        write_offline_config(home.path());
        bundlegate(home.path())
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached namespaces"));
    }

    #[test]
    fn cache_evict_rejects_traversal() {
        let home = TempDir::new().unwrap();
        write_offline_config(home.path());
        bundlegate(home.path())
            .args(["cache", "evict", "../etc"])
            .assert()
            .failure();
    }

    #[test]
    fn resolve_offline_fails_with_hint() {
        let home = TempDir::new().unwrap();
        write_offline_config(home.path());
        bundlegate(home.path())
            .arg("resolve")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }
}
