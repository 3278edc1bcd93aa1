use async_trait::async_trait;
use docshelf_core::source::{
    is_candidate_source, ProviderKind, RepoSummary, SourceFile, SourceProvider, MAX_SOURCE_FILES,
};
use docshelf_core::CoreResult;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{endpoint, ensure_success, upstream};

const SERVICE: &str = "bitbucket";
/// Directory depth walked by one source listing.
const LISTING_DEPTH: &str = "10";
/// Pages of listing / repositories followed before giving up.
const MAX_PAGES: usize = 20;

/// Bitbucket Cloud 2.0 adapter.
#[derive(Debug, Clone)]
pub struct BitbucketProvider {
    http: Client,
    base_url: String,
}

/// Bitbucket's paginated envelope.
#[derive(Debug, Deserialize)]
struct Paged<T> {
    values: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Workspace {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Repo {
    name: String,
    full_name: String,
    slug: Option<String>,
    workspace: Option<Workspace>,
    mainbranch: Option<Branch>,
    #[serde(default)]
    is_private: bool,
    description: Option<String>,
}

impl From<Repo> for RepoSummary {
    fn from(repo: Repo) -> Self {
        let (owner, slug) = match repo.full_name.split_once('/') {
            Some((owner, slug)) => (owner.to_string(), slug.to_string()),
            None => (String::new(), repo.full_name.clone()),
        };
        // Later calls address the repository by slug, not display name.
        let name = repo
            .slug
            .filter(|s| !s.is_empty())
            .unwrap_or(if slug.is_empty() { repo.name } else { slug });
        RepoSummary {
            owner: repo.workspace.map_or(owner, |w| w.slug),
            name,
            full_name: repo.full_name,
            default_branch: repo.mainbranch.map_or_else(|| "main".into(), |b| b.name),
            private: repo.is_private,
            description: repo.description.filter(|d| !d.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Entry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

fn is_candidate(entry: &Entry) -> bool {
    entry.kind == "commit_file" && is_candidate_source(&entry.path)
}

impl BitbucketProvider {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, token: &str) -> CoreResult<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| upstream(SERVICE, e))?;
        ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| upstream(SERVICE, e))
    }

    /// Follow `next` links until `keep` has collected `limit` values.
    async fn collect<T, F>(
        &self,
        first: Url,
        token: &str,
        limit: usize,
        mut keep: F,
    ) -> CoreResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;
        while let Some(url) = next.take() {
            let page: Paged<T> = self.get_json(url, token).await?;
            items.extend(page.values.into_iter().filter(|item| keep(item)));
            pages += 1;
            if items.len() >= limit || pages >= MAX_PAGES {
                break;
            }
            next = page.next.and_then(|link| Url::parse(&link).ok());
        }
        items.truncate(limit);
        Ok(items)
    }

    async fn main_branch(&self, token: &str, workspace: &str, repo: &str) -> CoreResult<String> {
        let url = endpoint(&self.base_url, ["repositories", workspace, repo])?;
        let repo: Repo = self.get_json(url, token).await?;
        Ok(repo.mainbranch.map_or_else(|| "main".into(), |b| b.name))
    }
}

#[async_trait]
impl SourceProvider for BitbucketProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bitbucket
    }

    async fn list_repos(&self, token: &str) -> CoreResult<Vec<RepoSummary>> {
        let mut url = endpoint(&self.base_url, ["repositories"])?;
        url.query_pairs_mut()
            .append_pair("role", "member")
            .append_pair("pagelen", "100");
        let repos: Vec<Repo> = self.collect(url, token, usize::MAX, |_| true).await?;
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
            None => self.main_branch(token, owner, repo).await?,
        };

        let mut url = endpoint(&self.base_url, ["repositories", owner, repo, "src", branch.as_str(), ""])?;
        url.query_pairs_mut()
            .append_pair("max_depth", LISTING_DEPTH)
            .append_pair("pagelen", "100");
        let entries: Vec<Entry> = self.collect(url, token, MAX_SOURCE_FILES, is_candidate).await?;

        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            let url = endpoint(
                &self.base_url,
                ["repositories", owner, repo, "src", branch.as_str()]
                    .into_iter()
                    .chain(entry.path.split('/')),
            )?;
            let response = self
                .http
                .get(url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| upstream(SERVICE, e))?;
            let content = ensure_success(SERVICE, response)
                .await?
                .text()
                .await
                .map_err(|e| upstream(SERVICE, e))?;
            files.push(SourceFile {
                path: entry.path,
                content,
            });
        }
        tracing::debug!(workspace = %owner, %repo, %branch, files = files.len(), "bitbucket sources fetched");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repository_maps_workspace_and_slug() {
        let repo: Repo = serde_json::from_value(json!({
            "name": "Shop API",
            "full_name": "acme/shop-api",
            "slug": "shop-api",
            "workspace": { "slug": "acme" },
            "mainbranch": { "name": "develop" },
            "is_private": true,
            "description": ""
        }))
        .unwrap();
        let summary = RepoSummary::from(repo);
        assert_eq!(summary.owner, "acme");
        assert_eq!(summary.name, "shop-api");
        assert_eq!(summary.default_branch, "develop");
        assert_eq!(summary.description, None);
    }

    #[test]
    fn repository_without_extras_falls_back_to_full_name() {
        let repo: Repo = serde_json::from_value(json!({
            "name": "shop",
            "full_name": "acme/shop"
        }))
        .unwrap();
        let summary = RepoSummary::from(repo);
        assert_eq!(summary.owner, "acme");
        assert_eq!(summary.name, "shop");
        assert_eq!(summary.default_branch, "main");
    }

    #[test]
    fn listing_keeps_source_files() {
        let page: Paged<Entry> = serde_json::from_value(json!({
            "values": [
                { "path": "src", "type": "commit_directory" },
                { "path": "src/app.js", "type": "commit_file" },
                { "path": "docs/readme.md", "type": "commit_file" }
            ]
        }))
        .unwrap();
        assert!(page.next.is_none());
        let kept: Vec<_> = page
            .values
            .iter()
            .filter(|e| is_candidate(e))
            .map(|e| e.path.as_str())
            .collect();
        assert_eq!(kept, vec!["src/app.js"]);
    }
}
