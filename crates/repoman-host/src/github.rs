use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use url::Url;

use repoman_core::config::MAX_PAGE_SIZE;
use repoman_core::error::RepomanError;

use crate::{HostProvider, RateLimitInfo, RemotePull, RemoteRepo, RepoFilter};

pub struct GitHubProvider {
    client: reqwest::Client,
    api_url: Url,
    per_page: u32,
}

impl GitHubProvider {
    pub fn new(api_url: Url, token: &str, per_page: u32) -> Result<Self, RepomanError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            RepomanError::AuthFailed {
                message: "token contains characters not allowed in an HTTP header".into(),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(concat!("repoman/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| RepomanError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url,
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
        })
    }

    fn url(&self, path: &str) -> Result<Url, RepomanError> {
        let base = self.api_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}")).map_err(|e| RepomanError::Config {
            message: format!("invalid API URL {base}{path}: {e}"),
        })
    }

    fn host(&self) -> String {
        self.api_url.host_str().unwrap_or("github").to_string()
    }

    /// Send a GET request. `Ok(None)` means 404; every other failure status
    /// is mapped onto the error taxonomy.
    async fn fetch(&self, url: Url) -> Result<Option<Response>, RepomanError> {
        tracing::debug!("GET {url}");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RepomanError::ApiError {
                status: 0,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(Some(resp));
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::UNAUTHORIZED {
            let body = resp.text().await.unwrap_or_default();
            return Err(RepomanError::AuthFailed {
                message: format!("GitHub rejected the token (401): {}", api_message(&body)),
            });
        }
        if status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN && rate_limit_exhausted(resp.headers()))
        {
            return Err(RepomanError::RateLimited {
                host: self.host(),
                retry_after_secs: retry_after_secs(resp.headers(), Utc::now()),
            });
        }
        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::FORBIDDEN {
            return Err(RepomanError::AuthFailed {
                message: format!("access forbidden (403): {}", api_message(&body)),
            });
        }
        Err(RepomanError::ApiError {
            status: status.as_u16(),
            message: api_message(&body),
        })
    }

    /// Fetch every page of a list endpoint. Follows `Link: rel="next"` when
    /// the server sends it, otherwise pages until a short page arrives.
    /// `Ok(None)` when the first page is a 404.
    async fn paginated_get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<Vec<T>>, RepomanError> {
        let page_url = |page: u32| -> Result<Url, RepomanError> {
            let mut url = self.url(path)?;
            {
                let mut pairs = url.query_pairs_mut();
                for (k, v) in query {
                    pairs.append_pair(k, v);
                }
                pairs.append_pair("per_page", &self.per_page.to_string());
                pairs.append_pair("page", &page.to_string());
            }
            Ok(url)
        };

        let mut all = Vec::new();
        let mut page = 1u32;
        let mut url = page_url(page)?;

        loop {
            let resp = match self.fetch(url.clone()).await? {
                Some(resp) => resp,
                None if page == 1 && all.is_empty() => return Ok(None),
                None => {
                    return Err(RepomanError::ApiError {
                        status: 404,
                        message: format!("page vanished while paginating {url}"),
                    })
                }
            };

            let link = resp
                .headers()
                .get(header::LINK)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let items: Vec<T> = resp.json().await.map_err(|e| RepomanError::ApiError {
                status: 0,
                message: format!("JSON parse error: {e}"),
            })?;
            let count = items.len();
            all.extend(items);

            page += 1;
            match link {
                Some(link) => match next_link(&link) {
                    Some(next) => url = next,
                    None => break,
                },
                None => {
                    if count < self.per_page as usize {
                        break;
                    }
                    url = page_url(page)?;
                }
            }
        }

        tracing::debug!("{path}: {} items over {} page(s)", all.len(), page - 1);
        Ok(Some(all))
    }
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_link(link: &str) -> Option<Url> {
    link.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|s| {
            let s = s.trim();
            s == "rel=\"next\"" || s == "rel=next"
        });
        if !is_next {
            return None;
        }
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

fn rate_limit_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0")
}

fn retry_after_secs(headers: &HeaderMap, now: DateTime<Utc>) -> u64 {
    let header_u64 = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };
    if let Some(secs) = header_u64("retry-after") {
        return secs;
    }
    if let Some(reset) = header_u64("x-ratelimit-reset") {
        let now = u64::try_from(now.timestamp()).unwrap_or(0);
        return reset.saturating_sub(now);
    }
    60
}

/// GitHub error bodies look like `{"message": "..."}`; fall back to the raw body.
fn api_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ApiMessage {
        message: String,
    }
    serde_json::from_str::<ApiMessage>(body)
        .map(|m| m.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[derive(Deserialize)]
struct GhRepo {
    full_name: String,
    name: String,
    owner: GhOwner,
    clone_url: String,
    #[serde(default)]
    ssh_url: String,
    default_branch: Option<String>,
    #[serde(default)]
    fork: bool,
    parent: Option<Box<GhRepo>>,
    #[serde(default)]
    archived: bool,
}

#[derive(Deserialize)]
struct GhOwner {
    login: String,
}

#[derive(Deserialize)]
struct GhPull {
    number: u64,
    title: String,
    #[serde(default)]
    draft: bool,
    user: Option<GhOwner>,
    created_at: DateTime<Utc>,
    base: GhPullBase,
}

#[derive(Deserialize)]
struct GhPullBase {
    repo: GhRepoRef,
}

#[derive(Deserialize)]
struct GhRepoRef {
    full_name: String,
}

#[derive(Deserialize)]
struct GhRateLimit {
    rate: GhRate,
}

#[derive(Deserialize)]
struct GhRate {
    limit: u32,
    remaining: u32,
    reset: i64,
}

impl From<GhRepo> for RemoteRepo {
    fn from(r: GhRepo) -> Self {
        RemoteRepo {
            full_name: r.full_name,
            owner: r.owner.login,
            name: r.name,
            clone_url: r.clone_url,
            ssh_url: r.ssh_url,
            default_branch: r.default_branch.unwrap_or_else(|| "main".to_string()),
            is_fork: r.fork,
            parent_full_name: r.parent.map(|p| p.full_name),
            is_archived: r.archived,
        }
    }
}

impl From<GhPull> for RemotePull {
    fn from(p: GhPull) -> Self {
        RemotePull {
            repo_full_name: p.base.repo.full_name,
            number: p.number,
            title: p.title,
            author: p
                .user
                .map(|u| u.login)
                .unwrap_or_else(|| "ghost".to_string()),
            draft: p.draft,
            created_at: p.created_at,
        }
    }
}

#[async_trait]
impl HostProvider for GitHubProvider {
    async fn validate_credentials(&self) -> Result<bool, RepomanError> {
        match self.fetch(self.url("/user")?).await {
            Ok(resp) => Ok(resp.is_some()),
            Err(RepomanError::AuthFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_repos(
        &self,
        owner: &str,
        filter: RepoFilter,
    ) -> Result<Vec<RemoteRepo>, RepomanError> {
        let query = [("type", "all"), ("sort", "full_name")];
        let gh_repos: Vec<GhRepo> =
            match self.paginated_get(&format!("/orgs/{owner}/repos"), &query).await? {
                Some(repos) => repos,
                None => {
                    tracing::debug!("organization {owner:?} not found, trying as a user");
                    self.paginated_get(&format!("/users/{owner}/repos"), &query)
                        .await?
                        .ok_or_else(|| RepomanError::OwnerNotFound {
                            owner: owner.to_string(),
                        })?
                }
            };

        let mut repos: Vec<RemoteRepo> = gh_repos
            .into_iter()
            .map(RemoteRepo::from)
            .filter(|r| filter.keeps(r))
            .collect();
        repos.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        repos.dedup_by(|a, b| a.full_name == b.full_name);
        Ok(repos)
    }

    async fn get_repo(&self, owner: &str, name: &str) -> Result<Option<RemoteRepo>, RepomanError> {
        let Some(resp) = self.fetch(self.url(&format!("/repos/{owner}/{name}"))?).await? else {
            return Ok(None);
        };
        let gh_repo: GhRepo = resp.json().await.map_err(|e| RepomanError::ApiError {
            status: 0,
            message: format!("JSON parse error: {e}"),
        })?;
        Ok(Some(RemoteRepo::from(gh_repo)))
    }

    async fn list_open_pulls(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<RemotePull>, RepomanError> {
        let path = format!("/repos/{owner}/{name}/pulls");
        let query = [("state", "open"), ("sort", "created")];
        let pulls: Vec<GhPull> = self
            .paginated_get(&path, &query)
            .await?
            .ok_or_else(|| RepomanError::ApiError {
                status: 404,
                message: format!("repository {owner}/{name} not found"),
            })?;
        Ok(pulls.into_iter().map(RemotePull::from).collect())
    }

    async fn rate_limit_status(&self) -> Result<RateLimitInfo, RepomanError> {
        let resp = self
            .fetch(self.url("/rate_limit")?)
            .await?
            .ok_or_else(|| RepomanError::ApiError {
                status: 404,
                message: "rate limit endpoint not available".into(),
            })?;

        let rl: GhRateLimit = resp.json().await.map_err(|e| RepomanError::ApiError {
            status: 0,
            message: format!("JSON parse error: {e}"),
        })?;

        let reset_at = DateTime::from_timestamp(rl.rate.reset, 0).unwrap_or_else(Utc::now);

        Ok(RateLimitInfo {
            limit: rl.rate.limit,
            remaining: rl.rate.remaining,
            reset_at,
        })
    }
}
