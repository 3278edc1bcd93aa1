use async_trait::async_trait;
use docshelf_core::source::{
    is_candidate_source, ProviderKind, RepoSummary, SourceFile, SourceProvider, MAX_SOURCE_FILES,
};
use docshelf_core::CoreResult;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use super::{endpoint, ensure_success, upstream};

const SERVICE: &str = "github";

/// GitHub REST v3 adapter.
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Repo {
    name: String,
    full_name: String,
    owner: Owner,
    default_branch: Option<String>,
    #[serde(default)]
    private: bool,
    description: Option<String>,
}

impl From<Repo> for RepoSummary {
    fn from(repo: Repo) -> Self {
        RepoSummary {
            owner: repo.owner.login,
            name: repo.name,
            full_name: repo.full_name,
            default_branch: repo.default_branch.unwrap_or_else(|| "main".into()),
            private: repo.private,
            description: repo.description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Tree {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Blob paths worth fetching, capped.
fn candidate_paths(tree: Tree) -> Vec<String> {
    tree.tree
        .into_iter()
        .filter(|entry| entry.kind == "blob" && is_candidate_source(&entry.path))
        .map(|entry| entry.path)
        .take(MAX_SOURCE_FILES)
        .collect()
}

impl GitHubProvider {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn get(&self, url: reqwest::Url, token: &str) -> RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(token)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn default_branch(&self, token: &str, owner: &str, repo: &str) -> CoreResult<String> {
        let url = endpoint(&self.base_url, ["repos", owner, repo])?;
        let response = self
            .get(url, token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| upstream(SERVICE, e))?;
        let repo: Repo = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| upstream(SERVICE, e))?;
        Ok(repo.default_branch.unwrap_or_else(|| "main".into()))
    }
}

#[async_trait]
impl SourceProvider for GitHubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn list_repos(&self, token: &str) -> CoreResult<Vec<RepoSummary>> {
        let mut url = endpoint(&self.base_url, ["user", "repos"])?;
        url.query_pairs_mut()
            .append_pair("per_page", "100")
            .append_pair("sort", "updated");
        let response = self
            .get(url, token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| upstream(SERVICE, e))?;
        let repos: Vec<Repo> = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| upstream(SERVICE, e))?;
        Ok(repos.into_iter().map(RepoSummary::from).collect())
    }

    async fn fetch_sources(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
    ) -> CoreResult<Vec<SourceFile>> {
        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => self.default_branch(token, owner, repo).await?,
        };

        let mut url = endpoint(&self.base_url, ["repos", owner, repo, "git", "trees", branch.as_str()])?;
        url.query_pairs_mut().append_pair("recursive", "1");
        let response = self
            .get(url, token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| upstream(SERVICE, e))?;
        let tree: Tree = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| upstream(SERVICE, e))?;
        if tree.truncated {
            tracing::warn!(%owner, %repo, %branch, "github tree listing truncated");
        }

        let mut files = Vec::new();
        for path in candidate_paths(tree) {
            let mut url = endpoint(
                &self.base_url,
                ["repos", owner, repo, "contents"]
                    .into_iter()
                    .chain(path.split('/')),
            )?;
            url.query_pairs_mut().append_pair("ref", &branch);
            let response = self
                .get(url, token)
                .header(reqwest::header::ACCEPT, "application/vnd.github.raw")
                .send()
                .await
                .map_err(|e| upstream(SERVICE, e))?;
            let content = ensure_success(SERVICE, response)
                .await?
                .text()
                .await
                .map_err(|e| upstream(SERVICE, e))?;
            files.push(SourceFile { path, content });
        }
        tracing::debug!(%owner, %repo, %branch, files = files.len(), "github sources fetched");
        Ok(files)
    }
}
