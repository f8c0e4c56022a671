//! Reddit search over the public JSON listing API.
//!
//! Without credentials requests go to `www.reddit.com` anonymously. With an
//! app id and secret, an app-only OAuth token is fetched once per run and
//! requests go to `oauth.reddit.com`, which has a much higher rate limit.
//!
//! # URL Pattern
//!
//! ```text
//! https://www.reddit.com/r/{source}/search.json?q={phrase}&restrict_sr=1&sort={sort}&t=all&limit={n}[&after={cursor}]
//! ```
//!
//! Listings are paged at most 100 items at a time via the `after` cursor.
//! Item ids are absolute permalinks, so the same post found through two
//! different queries dedups to one record.

use super::{SearchProvider, SearchQuery};
use crate::error::SearchError;
use crate::models::RawItem;
use crate::utils::clip_for_log;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use url::Url;

const PUBLIC_BASE: &str = "https://www.reddit.com";
const OAUTH_BASE: &str = "https://oauth.reddit.com";
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const MAX_PAGE_SIZE: usize = 100;
const PAGE_DELAY: Duration = Duration::from_millis(1000);

/// Reddit "script"/app-only credentials.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// Reddit search over the public JSON endpoint, or over OAuth when credentials
/// are configured. One instance is shared by every unit of a run.
#[derive(Debug)]
pub struct RedditSearch {
    client: Client,
    credentials: Option<RedditCredentials>,
    token: OnceCell<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    permalink: String,
    title: String,
    #[serde(default)]
    selftext: String,
    created_utc: f64,
}

impl RedditSearch {
    /// Build a client. Reddit rejects requests without a descriptive user agent.
    pub fn new(
        user_agent: &str,
        credentials: Option<RedditCredentials>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        info!(
            authenticated = credentials.is_some(),
            "Initialized Reddit search client"
        );
        Ok(Self {
            client,
            credentials,
            token: OnceCell::new(),
        })
    }

    fn search_url(
        &self,
        query: &SearchQuery<'_>,
        after: Option<&str>,
        page_size: usize,
    ) -> Result<Url, SearchError> {
        let base = if self.credentials.is_some() {
            OAUTH_BASE
        } else {
            PUBLIC_BASE
        };
        let mut url = Url::parse(base)?.join(&format!("r/{}/search.json", query.source))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", query.phrase)
                .append_pair("restrict_sr", "1")
                .append_pair("sort", query.sort.as_str())
                .append_pair("t", "all")
                .append_pair("limit", &page_size.to_string())
                .append_pair("raw_json", "1");
            if let Some(after) = after {
                pairs.append_pair("after", after);
            }
        }
        Ok(url)
    }

    async fn access_token(&self) -> Result<Option<&str>, SearchError> {
        let Some(creds) = &self.credentials else {
            return Ok(None);
        };
        let token = self
            .token
            .get_or_try_init(|| self.fetch_token(creds))
            .await?;
        Ok(Some(token.as_str()))
    }

    #[instrument(level = "info", skip_all)]
    async fn fetch_token(&self, creds: &RedditCredentials) -> Result<String, SearchError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Auth(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Auth(e.to_string()))?;
        info!("Obtained Reddit app-only token");
        Ok(token.access_token)
    }

    async fn fetch_page(&self, url: Url) -> Result<ListingData, SearchError> {
        debug!(%url, "Fetching search page");
        let mut request = self.client.get(url);
        if let Some(token) = self.access_token().await? {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited {
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: clip_for_log(&body, 200),
            });
        }
        parse_listing(&body)
    }
}

fn parse_listing(body: &str) -> Result<ListingData, SearchError> {
    serde_json::from_str::<Listing>(body)
        .map(|listing| listing.data)
        .map_err(|e| {
            SearchError::Malformed(format!("{e}; body: {}", clip_for_log(body, 120)))
        })
}

fn to_raw_item(post: Post, source: &str, observed_at: DateTime<Utc>) -> Option<RawItem> {
    let Some(created_at) = DateTime::from_timestamp(post.created_utc as i64, 0) else {
        warn!(permalink = %post.permalink, created_utc = post.created_utc, "Dropping post with invalid timestamp");
        return None;
    };
    Some(RawItem {
        id: format!("{PUBLIC_BASE}{}", post.permalink),
        title: post.title,
        body: post.selftext,
        source_location: format!("Reddit-{source}"),
        observed_at,
        created_at,
    })
}

impl SearchProvider for RedditSearch {
    #[instrument(level = "info", skip_all, fields(source = query.source, phrase = query.phrase, sort = query.sort.as_str()))]
    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<RawItem>, SearchError> {
        let observed_at = Utc::now();
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        while items.len() < query.limit {
            if after.is_some() {
                tokio::time::sleep(PAGE_DELAY).await;
            }
            let page_size = (query.limit - items.len()).min(MAX_PAGE_SIZE);
            let url = self.search_url(query, after.as_deref(), page_size)?;
            let page = self.fetch_page(url).await?;

            let fetched = page.children.len();
            items.extend(
                page.children
                    .into_iter()
                    .filter_map(|child| to_raw_item(child.data, query.source, observed_at)),
            );
            after = page.after;
            if fetched == 0 || after.is_none() {
                break;
            }
        }

        items.truncate(query.limit);
        info!(count = items.len(), "Search returned items");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SortOrder;

    const SAMPLE: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_next",
            "children": [
                {"kind": "t3", "data": {
                    "permalink": "/r/CreditCards/comments/abc123/cfu_approved/",
                    "title": "CFU approved!",
                    "selftext": "Instant approval, $5k SL",
                    "created_utc": 1746000000.0,
                    "score": 12
                }},
                {"kind": "t3", "data": {
                    "permalink": "/r/CreditCards/comments/def456/link_post/",
                    "title": "Link post without body",
                    "created_utc": 1746003600
                }}
            ]
        }
    }"#;

    fn query<'a>() -> SearchQuery<'a> {
        SearchQuery {
            source: "CreditCards",
            phrase: "\"Freedom Flex\" approved",
            sort: SortOrder::New,
            limit: 100,
        }
    }

    fn client(credentials: Option<RedditCredentials>) -> RedditSearch {
        RedditSearch::new("test-agent/0.1", credentials, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_parse_listing() {
        let data = parse_listing(SAMPLE).unwrap();
        assert_eq!(data.after.as_deref(), Some("t3_next"));
        assert_eq!(data.children.len(), 2);
        assert_eq!(data.children[1].data.selftext, "");
    }

    #[test]
    fn test_parse_listing_rejects_html() {
        let err = parse_listing("<html>blocked</html>").unwrap_err();
        assert!(matches!(err, SearchError::Malformed(_)));
    }

    #[test]
    fn test_to_raw_item() {
        let observed = Utc::now();
        let mut data = parse_listing(SAMPLE).unwrap();
        let post = data.children.remove(0).data;
        let item = to_raw_item(post, "CreditCards", observed).unwrap();
        assert_eq!(
            item.id,
            "https://www.reddit.com/r/CreditCards/comments/abc123/cfu_approved/"
        );
        assert_eq!(item.source_location, "Reddit-CreditCards");
        assert_eq!(item.created_at.timestamp(), 1_746_000_000);
        assert_eq!(item.observed_at, observed);
    }

    #[test]
    fn test_search_url_anonymous() {
        let url = client(None).search_url(&query(), None, 100).unwrap();
        assert_eq!(url.host_str(), Some("www.reddit.com"));
        assert_eq!(url.path(), "/r/CreditCards/search.json");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".into(), "\"Freedom Flex\" approved".into())));
        assert!(pairs.contains(&("sort".into(), "new".into())));
        assert!(pairs.contains(&("restrict_sr".into(), "1".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "after"));
    }

    #[test]
    fn test_search_url_oauth_with_cursor() {
        let creds = RedditCredentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
        };
        let url = client(Some(creds)).search_url(&query(), Some("t3_x"), 40).unwrap();
        assert_eq!(url.host_str(), Some("oauth.reddit.com"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("after".into(), "t3_x".into())));
        assert!(pairs.contains(&("limit".into(), "40".into())));
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = RedditCredentials {
            client_id: "id".into(),
            client_secret: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
