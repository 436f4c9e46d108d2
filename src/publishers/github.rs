//! GitHub Discussions publisher over the GraphQL API.
//!
//! Two targets are supported:
//!
//! - **Repository mode**: `GH_REPO=owner/name`
//! - **Organization mode**: `GH_ORG=org`, discussions live in
//!   `org/<GH_ORG_REPO>` (default `community`)
//!
//! The repository ID and the category ID (looked up by exact name) are
//! fetched before every `createDiscussion` mutation.

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument};

use crate::config::Config;
use crate::error::{RecapError, RecapResult};

pub const GRAPHQL_URL: &str = "https://api.github.com/graphql";
const TIMEOUT: Duration = Duration::from_secs(60);

const REPOSITORY_QUERY: &str = r#"
query($owner: String!, $name: String!) {
    repository(owner: $owner, name: $name) {
        id
        discussionCategories(first: 100) {
            nodes { id name }
        }
    }
}"#;

const CREATE_DISCUSSION_MUTATION: &str = r#"
mutation($repositoryId: ID!, $categoryId: ID!, $title: String!, $body: String!) {
    createDiscussion(input: {
        repositoryId: $repositoryId,
        categoryId: $categoryId,
        title: $title,
        body: $body
    }) {
        discussion { url }
    }
}"#;

const LIST_DISCUSSIONS_QUERY: &str = r#"
query($owner: String!, $name: String!, $limit: Int!) {
    repository(owner: $owner, name: $name) {
        discussions(first: $limit, orderBy: {field: CREATED_AT, direction: DESC}) {
            nodes {
                title
                url
                createdAt
                category { name }
            }
        }
    }
}"#;

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Deserialize)]
struct GraphQlErrorMessage {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

#[derive(Deserialize)]
struct RepositoryData {
    repository: Option<RepositoryNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    id: String,
    discussion_categories: Nodes<CategoryNode>,
}

#[derive(Deserialize)]
struct CategoryNode {
    id: String,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDiscussionData {
    create_discussion: CreatedDiscussion,
}

#[derive(Deserialize)]
struct CreatedDiscussion {
    discussion: DiscussionUrl,
}

#[derive(Deserialize)]
struct DiscussionUrl {
    url: String,
}

#[derive(Deserialize)]
struct DiscussionsData {
    repository: Option<DiscussionsNode>,
}

#[derive(Deserialize)]
struct DiscussionsNode {
    discussions: Nodes<Discussion>,
}

/// One entry of [`GitHubPublisher::list_discussions`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discussion {
    pub title: String,
    pub url: String,
    pub created_at: String,
    pub category: Option<CategoryName>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CategoryName {
    pub name: String,
}

/// Where discussions are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionTarget {
    pub owner: String,
    pub name: String,
    pub org_mode: bool,
}

impl DiscussionTarget {
    /// Repository mode when `repo` is set, else organization mode.
    pub fn resolve(repo: Option<&str>, org: Option<&str>, org_repo: &str) -> RecapResult<Self> {
        match (repo, org) {
            (Some(repo), _) => {
                let (owner, name) = repo
                    .split_once('/')
                    .filter(|(o, n)| !o.is_empty() && !n.is_empty())
                    .ok_or_else(|| {
                        RecapError::Config(format!("GH_REPO must be owner/name, got {repo:?}"))
                    })?;
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                    org_mode: false,
                })
            }
            (None, Some(org)) => Ok(Self {
                owner: org.to_string(),
                name: org_repo.to_string(),
                org_mode: true,
            }),
            (None, None) => Err(RecapError::Config(
                "set GH_REPO or GH_ORG for GitHub Discussions".to_string(),
            )),
        }
    }
}

impl fmt::Display for DiscussionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Clone)]
pub struct GitHubPublisher {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    target: DiscussionTarget,
    category: String,
}

impl fmt::Debug for GitHubPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubPublisher")
            .field("endpoint", &self.endpoint)
            .field("target", &self.target)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

impl GitHubPublisher {
    pub fn new(
        token: impl Into<String>,
        target: DiscussionTarget,
        category: impl Into<String>,
    ) -> RecapResult<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(TIMEOUT)
                .user_agent(concat!("news_recap/", env!("CARGO_PKG_VERSION")))
                .build()?,
            endpoint: GRAPHQL_URL.to_string(),
            token: token.into(),
            target,
            category: category.into(),
        })
    }

    /// Point at another GraphQL endpoint (GitHub Enterprise, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn from_config(config: &Config) -> RecapResult<Self> {
        let token = config
            .github_token
            .clone()
            .ok_or_else(|| RecapError::Config("GITHUB_TOKEN is not set".to_string()))?;
        let category = config
            .discussion_category
            .clone()
            .ok_or_else(|| RecapError::Config("GH_DISCUSSION_CATEGORY is not set".to_string()))?;
        let target = DiscussionTarget::resolve(
            config.github_repo.as_deref(),
            config.github_org.as_deref(),
            &config.github_org_repo,
        )?;
        Self::new(token, target, category)
    }

    pub fn target(&self) -> &DiscussionTarget {
        &self.target
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> RecapResult<T> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RecapError::from_response("GitHub", response).await);
        }

        let parsed: GraphQlResponse<T> = response.json().await?;
        if !parsed.errors.is_empty() {
            let messages: Vec<_> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(RecapError::GraphQl(messages.join("; ")));
        }
        parsed
            .data
            .ok_or_else(|| RecapError::GraphQl("response has no data".to_string()))
    }

    /// Repository node ID and the ID of the configured category.
    #[instrument(level = "debug", skip(self), fields(target = %self.target))]
    async fn repository_and_category(&self) -> RecapResult<(String, String)> {
        let data: RepositoryData = self
            .graphql(
                REPOSITORY_QUERY,
                json!({ "owner": self.target.owner, "name": self.target.name }),
            )
            .await?;
        let repository = data
            .repository
            .ok_or_else(|| RecapError::GraphQl(format!("repository {} not found", self.target)))?;

        let categories = repository.discussion_categories.nodes;
        match categories.iter().find(|c| c.name == self.category) {
            Some(category) => {
                debug!(category = %category.name, "Resolved discussion category");
                Ok((repository.id, category.id.clone()))
            }
            None => {
                let available: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
                error!(
                    category = %self.category,
                    available = %available.join(", "),
                    "Discussion category not found"
                );
                Err(RecapError::GraphQl(format!(
                    "discussion category {:?} not found",
                    self.category
                )))
            }
        }
    }

    /// Create a discussion and return its URL.
    #[instrument(level = "info", skip(self, body), fields(target = %self.target))]
    pub async fn create_discussion(&self, title: &str, body: &str) -> RecapResult<String> {
        if title.trim().is_empty() {
            return Err(RecapError::Config(
                "a title is required for GitHub Discussions".to_string(),
            ));
        }

        let (repository_id, category_id) = self.repository_and_category().await?;
        let data: CreateDiscussionData = self
            .graphql(
                CREATE_DISCUSSION_MUTATION,
                json!({
                    "repositoryId": repository_id,
                    "categoryId": category_id,
                    "title": title,
                    "body": body,
                }),
            )
            .await?;

        let url = data.create_discussion.discussion.url;
        info!(%url, "Created discussion");
        Ok(url)
    }

    /// Most recent discussions, newest first.
    #[instrument(level = "info", skip(self), fields(target = %self.target))]
    pub async fn list_discussions(&self, limit: usize) -> RecapResult<Vec<Discussion>> {
        let data: DiscussionsData = self
            .graphql(
                LIST_DISCUSSIONS_QUERY,
                json!({
                    "owner": self.target.owner,
                    "name": self.target.name,
                    "limit": limit.clamp(1, 100),
                }),
            )
            .await?;
        let discussions = data
            .repository
            .map(|r| r.discussions.nodes)
            .unwrap_or_default();
        info!(count = discussions.len(), "Listed discussions");
        Ok(discussions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repository_response() -> serde_json::Value {
        json!({
            "data": {
                "repository": {
                    "id": "R_1",
                    "discussionCategories": {
                        "nodes": [
                            { "id": "C_general", "name": "General" },
                            { "id": "C_news", "name": "News" }
                        ]
                    }
                }
            }
        })
    }

    fn publisher(server: &MockServer, category: &str) -> GitHubPublisher {
        let target = DiscussionTarget::resolve(Some("acme/site"), None, "community").unwrap();
        GitHubPublisher::new("ghp_test", target, category)
            .unwrap()
            .with_endpoint(server.uri())
    }

    #[test]
    fn test_target_resolution() {
        let repo = DiscussionTarget::resolve(Some("acme/site"), Some("ignored"), "community").unwrap();
        assert_eq!(repo.to_string(), "acme/site");
        assert!(!repo.org_mode);

        let org = DiscussionTarget::resolve(None, Some("acme"), "community").unwrap();
        assert_eq!(org.to_string(), "acme/community");
        assert!(org.org_mode);

        assert!(DiscussionTarget::resolve(Some("no-slash"), None, "community").is_err());
        assert!(DiscussionTarget::resolve(None, None, "community").is_err());
    }

    #[tokio::test]
    async fn test_create_discussion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer ghp_test"))
            .and(body_string_contains("discussionCategories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repository_response()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("createDiscussion"))
            .and(body_string_contains("C_news"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "createDiscussion": { "discussion": {
                    "url": "https://github.com/acme/site/discussions/7"
                } } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = publisher(&server, "News")
            .create_discussion("[AI News, 25.09.01] 헤드라인", "## body")
            .await
            .unwrap();
        assert_eq!(url, "https://github.com/acme/site/discussions/7");
    }

    #[tokio::test]
    async fn test_missing_category() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("discussionCategories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repository_response()))
            .mount(&server)
            .await;

        let err = publisher(&server, "Announcements")
            .create_discussion("title", "body")
            .await
            .unwrap_err();
        assert!(matches!(err, RecapError::GraphQl(m) if m.contains("Announcements")));
    }

    #[tokio::test]
    async fn test_graphql_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{ "message": "Bad credentials" }, { "message": "again" }]
            })))
            .mount(&server)
            .await;

        let err = publisher(&server, "News")
            .create_discussion("title", "body")
            .await
            .unwrap_err();
        assert!(matches!(err, RecapError::GraphQl(m) if m == "Bad credentials; again"));
    }

    #[tokio::test]
    async fn test_title_is_required() {
        let server = MockServer::start().await;
        let err = publisher(&server, "News")
            .create_discussion("  ", "body")
            .await
            .unwrap_err();
        assert!(matches!(err, RecapError::Config(_)));
    }

    #[tokio::test]
    async fn test_list_discussions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("CREATED_AT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "repository": { "discussions": { "nodes": [
                    {
                        "title": "[AI News, 25.09.01] 헤드라인",
                        "url": "https://github.com/acme/site/discussions/7",
                        "createdAt": "2025-09-01T09:00:00Z",
                        "category": { "name": "News" }
                    }
                ] } } }
            })))
            .mount(&server)
            .await;

        let discussions = publisher(&server, "News").list_discussions(5).await.unwrap();
        assert_eq!(discussions.len(), 1);
        assert_eq!(discussions[0].created_at, "2025-09-01T09:00:00Z");
        assert_eq!(discussions[0].category.as_ref().unwrap().name, "News");
    }

    #[tokio::test]
    async fn test_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let err = publisher(&server, "News").list_discussions(5).await.unwrap_err();
        assert!(matches!(err, RecapError::Api { status: 401, .. }));
    }
}
