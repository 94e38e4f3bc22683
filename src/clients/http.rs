//! reqwest implementations of the service contracts

use anyhow::{bail, Context};
use async_trait::async_trait;
use filter_types::{
    DatasetRef, DimensionOption, FilterJob, HierarchyNode, OptionsPage, VersionToken,
};
use reqwest::header::{ETAG, IF_MATCH};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{DatasetApi, FilterApi, HierarchyApi, PageParams};
use crate::config::Config;
use crate::error::{FilterError, Result};

/// Connection to one remote service
#[derive(Debug, Clone)]
struct ServiceClient {
    http: Client,
    base: Url,
    auth_token: Option<String>,
}

impl ServiceClient {
    fn new(base: &Url, config: &Config) -> anyhow::Result<Self> {
        if base.cannot_be_a_base() {
            bail!("service URL cannot be a base: {base}");
        }
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base: base.clone(),
            auth_token: config.service_auth_token.clone(),
        })
    }

    /// Base URL with `segments` appended, each percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and turn any non-success status into an upstream error
    async fn send(&self, builder: RequestBuilder, resource: &str) -> Result<Response> {
        tracing::debug!(resource, "calling upstream");
        let response = builder
            .send()
            .await
            .map_err(|source| FilterError::Transport {
                resource: resource.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                resource,
                status = status.as_u16(),
                body = %body.chars().take(200).collect::<String>(),
                "upstream call failed"
            );
            return Err(FilterError::upstream(status.as_u16(), resource));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: Response, resource: &str) -> Result<T> {
        response.json().await.map_err(|e| FilterError::Decode {
            resource: resource.to_string(),
            message: e.to_string(),
        })
    }
}

fn etag(response: &Response) -> Option<VersionToken> {
    response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(VersionToken::new)
}

fn require_etag(response: &Response, resource: &str) -> Result<VersionToken> {
    etag(response).ok_or_else(|| FilterError::Decode {
        resource: resource.to_string(),
        message: "response carries no ETag".to_string(),
    })
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct JobBody {
    filter_id: String,
    #[serde(default)]
    instance_id: Option<String>,
    dataset: DatasetRef,
    #[serde(default)]
    dimensions: Vec<NamedItem>,
}

#[derive(Debug, Deserialize)]
struct NamedItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ItemList<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct OptionItem {
    option: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OptionsBody {
    #[serde(default)]
    items: Vec<OptionItem>,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    limit: usize,
    #[serde(default)]
    total_count: usize,
}

impl OptionsBody {
    fn into_page(self, token: Option<VersionToken>) -> OptionsPage {
        OptionsPage {
            items: self
                .items
                .into_iter()
                .map(|item| match item.label {
                    Some(label) => DimensionOption::new(item.option, label),
                    None => DimensionOption::code_only(item.option),
                })
                .collect(),
            offset: self.offset,
            limit: self.limit,
            total_count: self.total_count,
            token,
        }
    }
}

#[derive(Debug, Serialize)]
struct OptionsBodyOut<'a> {
    options: &'a [String],
}

#[derive(Debug, Serialize, PartialEq)]
struct PatchOp<'a> {
    op: &'static str,
    path: &'static str,
    value: &'a [String],
}

fn patch_body<'a>(to_add: &'a [String], to_remove: &'a [String]) -> Vec<PatchOp<'a>> {
    let mut ops = Vec::with_capacity(2);
    if !to_add.is_empty() {
        ops.push(PatchOp {
            op: "add",
            path: "/options/-",
            value: to_add,
        });
    }
    if !to_remove.is_empty() {
        ops.push(PatchOp {
            op: "remove",
            path: "/options",
            value: to_remove,
        });
    }
    ops
}

#[derive(Debug, Deserialize)]
struct HierarchyBody {
    #[serde(default)]
    label: String,
    #[serde(default)]
    no_of_children: usize,
    links: HierarchyLinks,
    #[serde(default)]
    children: Vec<HierarchyBody>,
}

#[derive(Debug, Deserialize)]
struct HierarchyLinks {
    code: CodeLink,
}

#[derive(Debug, Deserialize)]
struct CodeLink {
    id: String,
}

impl From<HierarchyBody> for HierarchyNode {
    fn from(body: HierarchyBody) -> Self {
        let children: Vec<HierarchyNode> = body.children.into_iter().map(Into::into).collect();
        HierarchyNode {
            id: body.links.code.id,
            label: body.label,
            has_children: body.no_of_children > 0 || !children.is_empty(),
            children,
        }
    }
}

// ============================================================================
// FILTER SERVICE
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpFilterClient {
    service: ServiceClient,
}

impl HttpFilterClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            service: ServiceClient::new(&config.filter_api_url, config)?,
        })
    }

    fn dimension_url(&self, filter_id: &str, dimension: &str) -> Url {
        self.service
            .url(&["filters", filter_id, "dimensions", dimension])
    }

    async fn mutate_dimension(
        &self,
        method: Method,
        filter_id: &str,
        dimension: &str,
        body: Option<serde_json::Value>,
        expected: &VersionToken,
    ) -> Result<VersionToken> {
        let url = self.dimension_url(filter_id, dimension);
        let resource = url.path().to_string();
        let mut builder = self
            .service
            .request(method, url)
            .header(IF_MATCH, expected.as_str());
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = match self.service.send(builder, &resource).await {
            Err(FilterError::Upstream { status: 412, .. }) => {
                return Err(FilterError::StaleVersion {
                    resource,
                    expected: expected.clone(),
                })
            }
            other => other?,
        };
        require_etag(&response, &resource)
    }
}

#[async_trait]
impl FilterApi for HttpFilterClient {
    async fn get_job_state(&self, filter_id: &str) -> Result<(FilterJob, VersionToken)> {
        let url = self.service.url(&["filters", filter_id]);
        let resource = url.path().to_string();
        let response = self
            .service
            .send(self.service.request(Method::GET, url), &resource)
            .await?;
        let token = require_etag(&response, &resource)?;
        let body: JobBody = ServiceClient::json(response, &resource).await?;

        let job = FilterJob {
            filter_id: body.filter_id,
            version_token: Some(token.clone()),
            dataset: body.dataset,
            instance_id: body.instance_id,
            dimensions: body.dimensions.into_iter().map(|d| d.name).collect(),
        };
        Ok((job, token))
    }

    async fn get_dimension_options(
        &self,
        filter_id: &str,
        dimension: &str,
        page: PageParams,
    ) -> Result<OptionsPage> {
        let url = self
            .service
            .url(&["filters", filter_id, "dimensions", dimension, "options"]);
        let resource = url.path().to_string();
        let builder = self
            .service
            .request(Method::GET, url)
            .query(&[("offset", page.offset), ("limit", page.limit)]);
        let response = self.service.send(builder, &resource).await?;
        let token = etag(&response);
        let body: OptionsBody = ServiceClient::json(response, &resource).await?;
        Ok(body.into_page(token))
    }

    async fn set_dimension_options(
        &self,
        filter_id: &str,
        dimension: &str,
        codes: &[String],
        expected: &VersionToken,
    ) -> Result<VersionToken> {
        let body = serde_json::to_value(OptionsBodyOut { options: codes }).map_err(|e| {
            FilterError::Decode {
                resource: dimension.to_string(),
                message: e.to_string(),
            }
        })?;
        self.mutate_dimension(Method::PUT, filter_id, dimension, Some(body), expected)
            .await
    }

    async fn patch_dimension_options(
        &self,
        filter_id: &str,
        dimension: &str,
        to_add: &[String],
        to_remove: &[String],
        expected: &VersionToken,
    ) -> Result<VersionToken> {
        let body = serde_json::to_value(patch_body(to_add, to_remove)).map_err(|e| {
            FilterError::Decode {
                resource: dimension.to_string(),
                message: e.to_string(),
            }
        })?;
        self.mutate_dimension(Method::PATCH, filter_id, dimension, Some(body), expected)
            .await
    }

    async fn add_dimension(
        &self,
        filter_id: &str,
        dimension: &str,
        expected: &VersionToken,
    ) -> Result<VersionToken> {
        let body = serde_json::json!({ "options": [] });
        self.mutate_dimension(Method::POST, filter_id, dimension, Some(body), expected)
            .await
    }

    async fn remove_dimension(
        &self,
        filter_id: &str,
        dimension: &str,
        expected: &VersionToken,
    ) -> Result<VersionToken> {
        self.mutate_dimension(Method::DELETE, filter_id, dimension, None, expected)
            .await
    }
}

// ============================================================================
// DATASET CATALOG
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpDatasetClient {
    service: ServiceClient,
}

impl HttpDatasetClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            service: ServiceClient::new(&config.dataset_api_url, config)?,
        })
    }

    fn version_url(&self, dataset: &DatasetRef, rest: &[&str]) -> Url {
        let mut segments = vec![
            "datasets",
            dataset.dataset_id.as_str(),
            "editions",
            dataset.edition.as_str(),
            "versions",
            dataset.version.as_str(),
        ];
        segments.extend_from_slice(rest);
        self.service.url(&segments)
    }
}

#[async_trait]
impl DatasetApi for HttpDatasetClient {
    async fn get_options(
        &self,
        dataset: &DatasetRef,
        dimension: &str,
        page: PageParams,
    ) -> Result<OptionsPage> {
        let url = self.version_url(dataset, &["dimensions", dimension, "options"]);
        let resource = url.path().to_string();
        let builder = self
            .service
            .request(Method::GET, url)
            .query(&[("offset", page.offset), ("limit", page.limit)]);
        let response = self.service.send(builder, &resource).await?;
        let body: OptionsBody = ServiceClient::json(response, &resource).await?;
        // Catalog versions are immutable once published; no token to track
        Ok(body.into_page(None))
    }

    async fn get_version_dimensions(&self, dataset: &DatasetRef) -> Result<Vec<String>> {
        let url = self.version_url(dataset, &["dimensions"]);
        let resource = url.path().to_string();
        let response = self
            .service
            .send(self.service.request(Method::GET, url), &resource)
            .await?;
        let body: ItemList<NamedItem> = ServiceClient::json(response, &resource).await?;
        Ok(body.items.into_iter().map(|d| d.name).collect())
    }
}

// ============================================================================
// HIERARCHY SERVICE
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpHierarchyClient {
    service: ServiceClient,
}

impl HttpHierarchyClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            service: ServiceClient::new(&config.hierarchy_api_url, config)?,
        })
    }

    async fn fetch(&self, segments: &[&str]) -> Result<HierarchyNode> {
        let url = self.service.url(segments);
        let resource = url.path().to_string();
        let response = self
            .service
            .send(self.service.request(Method::GET, url), &resource)
            .await?;
        let body: HierarchyBody = ServiceClient::json(response, &resource).await?;
        Ok(body.into())
    }
}

#[async_trait]
impl HierarchyApi for HttpHierarchyClient {
    async fn get_root(&self, instance_id: &str, dimension: &str) -> Result<HierarchyNode> {
        self.fetch(&["hierarchies", instance_id, dimension]).await
    }

    async fn get_child(
        &self,
        instance_id: &str,
        dimension: &str,
        node_id: &str,
    ) -> Result<HierarchyNode> {
        self.fetch(&["hierarchies", instance_id, dimension, node_id])
            .await
    }
}
