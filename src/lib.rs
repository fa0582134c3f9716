//! org-pull - Update every local checkout of a GitHub organization
//!
//! org-pull lists all repositories of an organization and, for each one that
//! is already checked out under the base directory, runs the update command
//! (`git pull <clone_url>` by default) inside it. Repositories that are not
//! checked out are reported and left alone.
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`discovery`]: Repository descriptors and the paginated listing stream
//! - [`github`]: GitHub organization listing
//! - [`local`]: Working copy lookup
//! - [`git`]: Update command execution
//! - [`sync`]: The sync loop

pub mod config;
pub mod discovery;
pub mod git;
pub mod github;
pub mod local;
pub mod sync;

pub use config::Config;
pub use discovery::{list_all, RepoDescriptor, RepoPage, RepoSource};
pub use git::{FailureStage, GitClient, SyncOutcome};
pub use github::{Credentials, GitHubLister};
pub use local::{LocalCopy, LocalResolver};
pub use sync::{ConsoleReporter, Reporter, SyncEngine, SyncSummary};
