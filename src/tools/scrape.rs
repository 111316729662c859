//! Page fetching and text extraction for the web-scrape capability.

use async_trait::async_trait;

use crate::tools::{ScrapeTool, ToolError, truncate_chars};

/// Line width html2text wraps at.
const TEXT_WIDTH: usize = 100;

#[derive(Clone)]
pub struct WebScraper {
    client: reqwest::Client,
    max_chars: usize,
}

impl WebScraper {
    pub fn new(client: reqwest::Client, max_chars: usize) -> Self {
        Self { client, max_chars }
    }
}

#[async_trait]
impl ScrapeTool for WebScraper {
    async fn scrape(&self, url: &str) -> Result<String, ToolError> {
        log::debug!("Scraping {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ToolError::Status {
                service: "web page",
                status,
                body: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        let text = html2text::from_read(&body[..], TEXT_WIDTH)
            .map_err(|e| ToolError::Html(e.to_string()))?;
        Ok(truncate_chars(&squeeze_blank_lines(&text), self.max_chars))
    }
}

/// Collapses runs of blank lines left behind by navigation and layout markup.
fn squeeze_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank = false;
    for line in text.lines().map(str::trim_end) {
        if line.is_empty() {
            if !blank && !out.is_empty() {
                out.push('\n');
            }
            blank = true;
            continue;
        }
        blank = false;
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}
