//! Common test utilities and helpers for org-pull binary tests

#![allow(dead_code)]

use assert_fs::prelude::*;
use assert_fs::TempDir;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

/// Scratch layout for one run: a config home, a checkout base and a working directory
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config_home: PathBuf,
    pub base_dir: PathBuf,
    pub work_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_home = temp_dir.child("config");
        let base_dir = temp_dir.child("checkouts");
        let work_dir = temp_dir.child("checkouts/tools");
        config_home.create_dir_all().unwrap();
        work_dir.create_dir_all().unwrap();

        // The binary resolves paths from the real working directory
        Self {
            config_home: config_home.path().to_path_buf(),
            base_dir: base_dir.path().canonicalize().unwrap(),
            work_dir: work_dir.path().canonicalize().unwrap(),
            temp_dir,
        }
    }

    /// Create `<base>/<full_name>/.git`
    pub fn checkout(&self, full_name: &str) {
        self.temp_dir
            .child("checkouts")
            .child(full_name)
            .child(".git")
            .create_dir_all()
            .unwrap();
    }

    pub fn write_config(&self, content: &str) -> PathBuf {
        let config = self.temp_dir.child("org-pull.yml");
        config.write_str(content).unwrap();
        config.path().to_path_buf()
    }

    /// Config pointing at a mock API and running `sh -c <script> <clone_url>`
    pub fn sh_config(&self, api_url: &str, page_size: u8, script: &str) -> PathBuf {
        let config = json!({
            "base_directory": "..",
            "github": {
                "api_url": api_url,
                "page_size": page_size,
                "request_timeout": 10
            },
            "sync": {
                "command": "sh",
                "args": ["-c", script],
                "timeout": 20
            },
            "logging": { "level": "info", "color": false }
        });
        // JSON is valid YAML
        self.write_config(&config.to_string())
    }

    /// Run the binary from the work directory with a clean environment
    pub async fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_org-pull"))
            .args(args)
            .current_dir(&self.work_dir)
            .env("XDG_CONFIG_HOME", &self.config_home)
            .env_remove("GIT_ORG")
            .env_remove("GIT_TOKEN")
            .env_remove("RUST_LOG")
            .output()
            .await
            .expect("Failed to run org-pull")
    }

    pub fn base_path(&self, full_name: &str) -> PathBuf {
        self.base_dir.join(full_name)
    }
}

/// Minimal GitHub repository payload accepted by the API client
pub fn repo_json(full_name: &str) -> Value {
    let (owner, name) = full_name.split_once('/').unwrap();
    let user_url = |suffix: &str| format!("https://api.github.com/users/{}{}", owner, suffix);

    json!({
        "id": 1000 + full_name.len() as u64,
        "node_id": format!("R_{}", name),
        "name": name,
        "full_name": full_name,
        "owner": {
            "login": owner,
            "id": 1,
            "node_id": "O_1",
            "avatar_url": "https://avatars.githubusercontent.com/u/1",
            "gravatar_id": "",
            "url": user_url(""),
            "html_url": format!("https://github.com/{}", owner),
            "followers_url": user_url("/followers"),
            "following_url": user_url("/following"),
            "gists_url": user_url("/gists"),
            "starred_url": user_url("/starred"),
            "subscriptions_url": user_url("/subscriptions"),
            "organizations_url": user_url("/orgs"),
            "repos_url": user_url("/repos"),
            "events_url": user_url("/events"),
            "received_events_url": user_url("/received_events"),
            "type": "Organization",
            "site_admin": false
        },
        "url": format!("https://api.github.com/repos/{}", full_name),
        "html_url": format!("https://github.com/{}", full_name),
        "clone_url": clone_url(full_name),
        "ssh_url": format!("git@github.com:{}.git", full_name)
    })
}

pub fn clone_url(full_name: &str) -> String {
    format!("https://github.com/{}.git", full_name)
}

/// `Link` header announcing `next` for an org listing
pub fn next_link(server_uri: &str, org: &str, per_page: u8, next: u32) -> String {
    format!(
        "<{}/orgs/{}/repos?type=all&per_page={}&page={}>; rel=\"next\"",
        server_uri, org, per_page, next
    )
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}

pub fn display(path: &Path) -> String {
    path.display().to_string()
}
