use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use octocrab::models::Repository;
use octocrab::params::repos::Type as RepoType;
use octocrab::{Octocrab, Page};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::discovery::{RepoDescriptor, RepoPage, RepoSource};

/// Organization to list and the static credential presented on every request
#[derive(Clone)]
pub struct Credentials {
    pub organization: String,
    pub token: String,
}

impl Credentials {
    pub fn new(organization: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            token: token.into(),
        }
    }
}

// Keep the token out of debug output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("organization", &self.organization)
            .field("token", &if self.token.is_empty() { "<none>" } else { "<redacted>" })
            .finish()
    }
}

/// Lists the repositories of one GitHub organization, a page at a time
pub struct GitHubLister {
    client: Octocrab,
    organization: String,
    page_size: u8,
    request_timeout: Duration,
}

impl GitHubLister {
    /// Create a lister with a static bearer token (or anonymous access if empty)
    pub fn new(credentials: &Credentials, config: &Config) -> Result<Self> {
        let organization = credentials.organization.trim();
        if organization.is_empty() {
            return Err(anyhow!(
                "No organization given. Pass --org or set GIT_ORG"
            ));
        }

        let mut builder = Octocrab::builder();

        if let Some(api_url) = &config.github.api_url {
            debug!("Using GitHub API at {}", api_url);
            builder = builder
                .base_uri(api_url.as_str())
                .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;
        }

        if credentials.token.is_empty() {
            warn!("No access token given; only public repositories will be listed");
        } else {
            builder = builder.personal_token(credentials.token.clone());
        }

        let client = builder.build().context("Failed to create GitHub client")?;

        info!(
            "Listing repositories of organization {} ({} per page)",
            organization, config.github.page_size
        );

        Ok(Self {
            client,
            organization: organization.to_string(),
            page_size: config.github.page_size,
            request_timeout: Duration::from_secs(config.github.request_timeout),
        })
    }
}

#[async_trait]
impl RepoSource for GitHubLister {
    async fn fetch_page(&self, page: u32) -> Result<RepoPage> {
        let orgs = self.client.orgs(self.organization.as_str());
        let request = orgs
            .list_repos()
            .repo_type(RepoType::All)
            .per_page(self.page_size)
            .page(page)
            .send();

        let response = timeout(self.request_timeout, request)
            .await
            .map_err(|_| {
                anyhow!(
                    "Timed out after {}s fetching repositories for organization {} page {}",
                    self.request_timeout.as_secs(),
                    self.organization,
                    page
                )
            })?
            .with_context(|| {
                format!(
                    "Failed to fetch repositories for organization {} page {}",
                    self.organization, page
                )
            })?;

        Ok(convert_page(response, page))
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}

/// Turn an API page into descriptors plus the following page number
fn convert_page(response: Page<Repository>, current: u32) -> RepoPage {
    let next_page = response.next.as_ref().map(|next| {
        next.query()
            .and_then(page_from_query)
            .unwrap_or(current + 1)
    });

    let items = response
        .items
        .iter()
        .filter_map(|repo| {
            let descriptor = to_descriptor(repo);
            if descriptor.is_none() {
                warn!("Repository {} has no clone URL, ignoring it", repo.name);
            }
            descriptor
        })
        .collect();

    RepoPage { items, next_page }
}

/// Convert an octocrab Repository to our descriptor
fn to_descriptor(repo: &Repository) -> Option<RepoDescriptor> {
    let full_name = repo.full_name.clone().unwrap_or_else(|| match &repo.owner {
        Some(owner) => format!("{}/{}", owner.login, repo.name),
        None => repo.name.clone(),
    });

    // Prefer the HTTPS clone URL, fall back to SSH
    let clone_url = repo
        .clone_url
        .as_ref()
        .map(|url| url.to_string())
        .or_else(|| repo.ssh_url.clone())?;

    Some(RepoDescriptor {
        full_name,
        clone_url,
    })
}

/// Extract the `page` parameter from a query string
fn page_from_query(query: &str) -> Option<u32> {
    query
        .split('&')
        .find_map(|param| param.strip_prefix("page="))
        .and_then(|value| value.parse().ok())
}
