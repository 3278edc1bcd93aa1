//! reqwest adapters for the outbound collaborator ports.

pub mod bitbucket;
pub mod enhancer;
pub mod github;

use std::time::Duration;

use docshelf_core::CoreError;
use reqwest::{Client, Response, Url};

pub use bitbucket::BitbucketProvider;
pub use enhancer::HttpEnhancer;
pub use github::GitHubProvider;

const USER_AGENT: &str = concat!("docshelf/", env!("CARGO_PKG_VERSION"));

/// Shared client settings for every outbound call.
pub fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

pub(crate) fn upstream(service: &str, err: reqwest::Error) -> CoreError {
    tracing::warn!(service, error = %err, "outbound request failed");
    CoreError::Upstream(format!("{service} request failed: {err}"))
}

/// Turn a non-2xx answer into an upstream error carrying the status.
pub(crate) async fn ensure_success(service: &str, response: Response) -> Result<Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(service, %status, "outbound request rejected");
    let detail = body.chars().take(200).collect::<String>();
    Err(CoreError::Upstream(format!(
        "{service} answered {status}: {detail}"
    )))
}

/// `base` with each segment appended and percent-encoded.
pub(crate) fn endpoint<'a>(
    base: &str,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, CoreError> {
    let mut url = Url::parse(base)
        .map_err(|e| CoreError::Upstream(format!("invalid upstream url {base:?}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| CoreError::Upstream(format!("upstream url {base:?} cannot take a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_segments() {
        let url = endpoint(
            "https://api.github.com",
            ["repos", "acme", "shop", "contents", "src", "my routes.ts"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/shop/contents/src/my%20routes.ts"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let url = endpoint("https://api.bitbucket.org/2.0/", ["repositories"]).unwrap();
        assert_eq!(url.as_str(), "https://api.bitbucket.org/2.0/repositories");
    }

    #[test]
    fn endpoint_rejects_garbage() {
        assert!(matches!(
            endpoint("not a url", ["x"]),
            Err(CoreError::Upstream(_))
        ));
    }
}
