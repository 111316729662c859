//! Web search through the Serper Google Search API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::tools::{SearchHit, SearchTool, ToolError};

pub const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Clone)]
pub struct SerperSearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    num_results: usize,
}

impl SerperSearch {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: SERPER_ENDPOINT.to_string(),
            num_results: 10,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_num_results(mut self, n: usize) -> Self {
        self.num_results = n.max(1);
        self
    }
}

#[async_trait]
impl SearchTool for SerperSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        log::debug!("Serper search: {}", query);
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&SerperRequest {
                q: query,
                num: self.num_results,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Status {
                service: "Serper",
                status,
                body,
            });
        }

        let body: SerperResponse = response.json().await?;
        Ok(body
            .organic
            .into_iter()
            .filter(|hit| !hit.link.is_empty())
            .map(|hit| SearchHit {
                title: hit.title,
                link: hit.link,
                snippet: hit.snippet,
            })
            .collect())
    }
}
