//! Learn content API client
//!
//! Requests are credentialed with the session cookies of an already
//! authenticated browser session. Nothing here logs in or refreshes a session.

use reqwest::{
    Client,
    cookie::Jar,
    header::{self, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use url::Url;

use super::models::ContentListing;
use super::{LearnError, Result};

/// Extra fields requested when `expand` is enabled
const EXPAND_FIELDS: &str = "assignedGroups,selfEnrollmentGroups.group,gradebookCategory";

/// Default page size for content listings. Only one page is ever requested.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Anything that can list the children of a course or content item
pub trait ContentSource {
    /// Origin the relative permanent URLs of files are resolved against
    fn origin(&self) -> &Url;

    /// List the children of `content_id`, or the course root when `None`
    async fn list_children(
        &self,
        course_id: &str,
        content_id: Option<&str>,
    ) -> Result<ContentListing>;

    /// Page size used for listings
    fn page_limit(&self) -> u32 {
        DEFAULT_PAGE_LIMIT
    }
}

#[derive(Debug, Deserialize)]
struct CourseSummary {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LearnClient {
    client: Client,
    jar: Arc<Jar>,
    origin: Url,
    page_limit: u32,
    expand: bool,
}

impl LearnClient {
    /// Create a client for the Learn instance at `origin`.
    ///
    /// `session_cookie` is a `Cookie` header style string (`a=1; b=2`) copied
    /// from a logged in browser.
    pub fn new(origin: &str, session_cookie: Option<&str>) -> Result<Self> {
        let mut origin = Url::parse(origin)?;
        if origin.cannot_be_a_base() {
            return Err(LearnError::InvalidOrigin(origin.to_string()));
        }
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);

        let jar = Arc::new(Jar::default());
        if let Some(cookies) = session_cookie {
            let mut count = 0;
            for pair in cookies.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                jar.add_cookie_str(pair, &origin);
                count += 1;
            }
            debug!(count, origin = %origin, "Loaded session cookies");
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .cookie_provider(jar.clone())
            .build()?;

        Ok(Self {
            client,
            jar,
            origin,
            page_limit: DEFAULT_PAGE_LIMIT,
            expand: false,
        })
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    pub fn with_expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    /// Cookie jar holding the session, shared with the file downloader
    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }

    fn api_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.origin.clone();
        url.path_segments_mut()
            .map_err(|_| LearnError::InvalidOrigin(self.origin.to_string()))?
            .clear()
            .extend(segments);
        Ok(url)
    }

    /// URL of the listing for a course root or a content item's children
    pub fn listing_url(&self, course_id: &str, content_id: Option<&str>) -> Result<Url> {
        let base = ["learn", "api", "v1", "courses", course_id, "contents"];
        let mut url = match content_id {
            Some(id) => self.api_url(base.into_iter().chain([id, "children"]))?,
            None => self.api_url(base)?,
        };

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("@view", "Summary")
                .append_pair("includeInActivityTracking", "true")
                .append_pair("limit", &self.page_limit.to_string());
            if self.expand {
                query.append_pair("expand", EXPAND_FIELDS);
            }
        }

        Ok(url)
    }

    /// Look up the display name of a course, used to label the download folder
    #[instrument(level = "debug", skip(self))]
    pub async fn course_name(&self, course_id: &str) -> Result<Option<String>> {
        let url = self.api_url(["learn", "api", "public", "v3", "courses", course_id])?;
        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(LearnError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let summary: CourseSummary = serde_json::from_slice(&response.bytes().await?)?;
        Ok(summary.name.filter(|name| !name.trim().is_empty()))
    }
}

impl ContentSource for LearnClient {
    fn origin(&self) -> &Url {
        &self.origin
    }

    fn page_limit(&self) -> u32 {
        self.page_limit
    }

    async fn list_children(
        &self,
        course_id: &str,
        content_id: Option<&str>,
    ) -> Result<ContentListing> {
        let url = self.listing_url(course_id, content_id)?;
        info!(url = %url, "Fetching from API");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        info!(
            status = status.as_u16(),
            content_type = ?response.headers().get(header::CONTENT_TYPE),
            "API response received"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                status = status.as_u16(),
                reason = status.canonical_reason().unwrap_or_default(),
                body = %body,
                "API request failed"
            );
            return Err(LearnError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let listing: ContentListing = serde_json::from_slice(&response.bytes().await?)?;
        debug!(
            has_results = listing.results.is_some(),
            result_count = listing.results.as_ref().map_or(0, Vec::len),
            "JSON parsed successfully"
        );

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header as header_matcher, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn listing_url_for_root_and_children() {
        let client = LearnClient::new("https://learn.example.edu/ultra/stream?x=1", None).unwrap();

        let root = client.listing_url("_5_1", None).unwrap();
        assert_eq!(root.path(), "/learn/api/v1/courses/_5_1/contents");
        assert!(root.query().unwrap().contains("limit=100"));
        assert!(!root.query().unwrap().contains("expand"));

        let children = client
            .with_expand(true)
            .with_page_limit(50)
            .listing_url("_5_1", Some("_9_1"))
            .unwrap();
        assert_eq!(children.path(), "/learn/api/v1/courses/_5_1/contents/_9_1/children");
        let pairs: Vec<(String, String)> = children.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("@view".into(), "Summary".into())));
        assert!(pairs.contains(&("includeInActivityTracking".into(), "true".into())));
        assert!(pairs.contains(&("limit".into(), "50".into())));
        assert!(pairs.contains(&("expand".into(), EXPAND_FIELDS.into())));
    }

    #[test]
    fn rejects_non_base_origin() {
        let err = LearnClient::new("mailto:someone@example.edu", None).unwrap_err();
        assert!(matches!(err, LearnError::InvalidOrigin(_)));
    }

    #[tokio::test]
    async fn lists_children_with_session_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/learn/api/v1/courses/_1_1/contents/_2_1/children"))
            .and(query_param("limit", "100"))
            .and(header_matcher("accept", "application/json"))
            .and(header_matcher("cookie", "BbRouter=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "id": "_3_1", "title": "Notes", "contentHandler": "resource/x-bb-file" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LearnClient::new(&server.uri(), Some("BbRouter=abc")).unwrap();
        let listing = client.list_children("_1_1", Some("_2_1")).await.unwrap();
        let results = listing.results.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title(), "Notes");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = LearnClient::new(&server.uri(), None).unwrap();
        let err = client.list_children("_1_1", None).await.unwrap_err();
        assert!(matches!(err, LearnError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let client = LearnClient::new(&server.uri(), None).unwrap();
        let err = client.list_children("_1_1", None).await.unwrap_err();
        assert!(matches!(err, LearnError::JsonError(_)));
    }

    #[tokio::test]
    async fn course_name_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/learn/api/public/v3/courses/_1_1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "_1_1", "name": "Algebra I" })),
            )
            .mount(&server)
            .await;

        let client = LearnClient::new(&server.uri(), None).unwrap();
        assert_eq!(
            client.course_name("_1_1").await.unwrap().as_deref(),
            Some("Algebra I")
        );
    }
}
