//! Local working copy resolution
//!
//! A repository counts as checked out when `<base>/<full_name>/.git` exists.
//! Absence and unreadable paths are reported separately so the caller can
//! decide how loudly to complain; neither is an error for the run.

use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::discovery::RepoDescriptor;

/// Result of looking for a repository's working copy
#[derive(Debug)]
pub enum LocalCopy {
    /// `.git` metadata found; holds the working copy directory
    Present(PathBuf),
    /// No working copy at the expected location
    Absent(PathBuf),
    /// The location could not be inspected
    Unreadable { path: PathBuf, error: io::Error },
    /// The full name would resolve outside the base directory
    Invalid { reason: String },
}

impl LocalCopy {
    pub fn is_present(&self) -> bool {
        matches!(self, LocalCopy::Present(_))
    }
}

/// Maps repository descriptors onto directories below a fixed base
#[derive(Debug, Clone)]
pub struct LocalResolver {
    base_directory: PathBuf,
}

impl LocalResolver {
    /// `base_directory` should already be absolute; it is fixed for the run
    pub fn new(base_directory: impl Into<PathBuf>) -> Self {
        Self {
            base_directory: base_directory.into(),
        }
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Directory where the working copy of `repo` is expected
    pub fn repo_directory(&self, repo: &RepoDescriptor) -> Option<PathBuf> {
        let relative = Path::new(&repo.full_name);
        let is_contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        if !is_contained || repo.full_name.is_empty() {
            return None;
        }

        Some(self.base_directory.join(relative))
    }

    /// Look for the working copy of `repo`
    pub fn resolve(&self, repo: &RepoDescriptor) -> LocalCopy {
        let Some(directory) = self.repo_directory(repo) else {
            return LocalCopy::Invalid {
                reason: format!("{} is not a relative owner/name path", repo.full_name),
            };
        };

        let git_dir = directory.join(".git");
        debug!("Checking for {}", git_dir.display());

        // `.git` may also be a file (worktrees, submodules)
        match git_dir.try_exists() {
            Ok(true) => LocalCopy::Present(directory),
            Ok(false) => LocalCopy::Absent(directory),
            Err(error) => LocalCopy::Unreadable {
                path: git_dir,
                error,
            },
        }
    }

    /// Whether a working copy exists; unreadable counts as missing
    pub fn exists(&self, repo: &RepoDescriptor) -> bool {
        self.resolve(repo).is_present()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn repo(full_name: &str) -> RepoDescriptor {
        RepoDescriptor::new(full_name, format!("https://github.com/{}.git", full_name))
    }

    #[test]
    fn test_present_when_git_dir_exists() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("acme/web/.git")).unwrap();

        let resolver = LocalResolver::new(temp_dir.path());

        assert_matches!(
            resolver.resolve(&repo("acme/web")),
            LocalCopy::Present(path) if path == temp_dir.path().join("acme/web")
        );
        assert!(resolver.exists(&repo("acme/web")));
    }

    #[test]
    fn test_git_file_counts_as_present() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("acme/wt")).unwrap();
        std::fs::write(temp_dir.path().join("acme/wt/.git"), "gitdir: /elsewhere\n").unwrap();

        let resolver = LocalResolver::new(temp_dir.path());
        assert!(resolver.exists(&repo("acme/wt")));
    }

    #[test]
    fn test_absent_when_directory_missing() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = LocalResolver::new(temp_dir.path());

        assert_matches!(resolver.resolve(&repo("acme/api")), LocalCopy::Absent(_));
        assert!(!resolver.exists(&repo("acme/api")));
    }

    #[test]
    fn test_absent_when_not_a_checkout() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("acme/api/src")).unwrap();

        let resolver = LocalResolver::new(temp_dir.path());
        assert_matches!(resolver.resolve(&repo("acme/api")), LocalCopy::Absent(_));
    }

    #[test]
    fn test_escaping_names_are_invalid() {
        let resolver = LocalResolver::new("/srv/repos");

        assert_matches!(resolver.resolve(&repo("../etc")), LocalCopy::Invalid { .. });
        assert_matches!(resolver.resolve(&repo("/etc/passwd")), LocalCopy::Invalid { .. });
        assert_matches!(resolver.resolve(&repo("")), LocalCopy::Invalid { .. });
        assert!(resolver.repo_directory(&repo("acme/./web")).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_parent_is_reported() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let locked = temp_dir.path().join("locked");
        std::fs::create_dir_all(locked.join("web/.git")).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        if std::fs::read_dir(&locked).is_ok() {
            // running as root: permissions are not enforced
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            eprintln!("skipping: directory permissions are not enforced for this user");
            return;
        }

        let resolver = LocalResolver::new(temp_dir.path());
        let result = resolver.resolve(&repo("locked/web"));
        let exists = resolver.exists(&repo("locked/web"));

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_matches!(
            result,
            LocalCopy::Unreadable { path, .. } if path == locked.join("web/.git")
        );
        assert!(!exists);
    }
}
