//! Asana workspace listings
//!
//! Users and projects are listed with offset-token pagination:
//! `GET {base}/workspaces/{workspace}/{resource}?limit=..&offset=..&opt_fields=..`
//! and a response body of `{"data": [...], "next_page": {"offset": ..} | null}`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};
use url::Url;

use crate::cancel::Cancellation;
use crate::client::ResilientClient;
use crate::config::{PROJECT_PAGE_SIZE, USER_PAGE_SIZE};
use crate::fetcher::pagination::{fetch_all, Page};
use crate::fetcher::{FetcherError, FetcherResult, ResourceSource};
use crate::{Project, User};

const USER_FIELDS: &str = "gid,name,email,workspaces";
const PROJECT_FIELDS: &str =
    "gid,name,archived,color,created_at,modified_at,owner,public,workspace,team";

/// Continuation marker of a list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextPage {
    /// Opaque cursor for the following page
    #[serde(default)]
    pub offset: String,
    /// Relative path of the following page
    #[serde(default)]
    pub path: String,
    /// Absolute URI of the following page
    #[serde(default)]
    pub uri: String,
}

/// Envelope of every list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    /// Items of this page
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    /// Present when more pages follow
    #[serde(default)]
    pub next_page: Option<NextPage>,
}

impl<T> From<ListResponse<T>> for Page<T> {
    fn from(response: ListResponse<T>) -> Self {
        Page::new(response.data, response.next_page.map(|next| next.offset))
    }
}

/// Asana API client for workspace users and projects.
#[derive(Debug, Clone)]
pub struct AsanaClient {
    http: Arc<ResilientClient>,
    workspace: String,
    base_url: String,
    user_page_size: usize,
    project_page_size: usize,
}

impl AsanaClient {
    /// Create a client for `workspace` rooted at `base_url` (e.g. `https://app.asana.com/api/1.0`).
    pub fn new(http: Arc<ResilientClient>, workspace: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            workspace: workspace.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_page_size: USER_PAGE_SIZE,
            project_page_size: PROJECT_PAGE_SIZE,
        }
    }

    /// Override the page size of user listings.
    pub fn with_user_page_size(mut self, page_size: usize) -> Self {
        self.user_page_size = page_size;
        self
    }

    /// Override the page size of project listings.
    pub fn with_project_page_size(mut self, page_size: usize) -> Self {
        self.project_page_size = page_size;
        self
    }

    /// Fetch one page of users.
    pub async fn list_users(
        &self,
        limit: usize,
        offset: Option<&str>,
        cancel: &Cancellation,
    ) -> FetcherResult<Page<User>> {
        self.list("users", USER_FIELDS, limit, offset, cancel).await
    }

    /// Fetch one page of projects.
    pub async fn list_projects(
        &self,
        limit: usize,
        offset: Option<&str>,
        cancel: &Cancellation,
    ) -> FetcherResult<Page<Project>> {
        self.list("projects", PROJECT_FIELDS, limit, offset, cancel).await
    }

    /// Every user of the workspace.
    pub async fn fetch_all_users(&self, cancel: &Cancellation) -> FetcherResult<Vec<User>> {
        let limit = self.user_page_size;
        fetch_all(move |cursor| async move { self.list_users(limit, cursor.as_deref(), cancel).await })
            .instrument(info_span!("fetch_all", resource = "users"))
            .await
    }

    /// Every project of the workspace.
    pub async fn fetch_all_projects(&self, cancel: &Cancellation) -> FetcherResult<Vec<Project>> {
        let limit = self.project_page_size;
        fetch_all(move |cursor| async move { self.list_projects(limit, cursor.as_deref(), cancel).await })
            .instrument(info_span!("fetch_all", resource = "projects"))
            .await
    }

    fn endpoint(&self, resource: &str, fields: &str, limit: usize, offset: Option<&str>) -> FetcherResult<Url> {
        let mut url = Url::parse(&format!(
            "{}/workspaces/{}/{}",
            self.base_url, self.workspace, resource
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(offset) = offset.filter(|offset| !offset.is_empty()) {
                query.append_pair("offset", offset);
            }
            query.append_pair("opt_fields", fields);
        }
        Ok(url)
    }

    async fn list<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        fields: &str,
        limit: usize,
        offset: Option<&str>,
        cancel: &Cancellation,
    ) -> FetcherResult<Page<T>> {
        let url = self.endpoint(resource, fields, limit, offset)?;
        debug!(resource, limit, offset = offset.unwrap_or(""), "listing page");

        let body = self
            .http
            .fetch_body(&url, cancel)
            .await
            .map_err(|source| FetcherError::Request { resource, source })?;

        let response: ListResponse<T> = serde_json::from_slice(&body)
            .map_err(|source| FetcherError::MalformedResponse { resource, source })?;
        Ok(response.into())
    }
}

#[async_trait]
impl ResourceSource for AsanaClient {
    async fn fetch_users(&self, cancel: &Cancellation) -> FetcherResult<Vec<User>> {
        self.fetch_all_users(cancel).await
    }

    async fn fetch_projects(&self, cancel: &Cancellation) -> FetcherResult<Vec<Project>> {
        self.fetch_all_projects(cancel).await
    }
}
