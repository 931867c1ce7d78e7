//! Noun Project v2 icon API client.
//!
//! Every request is signed with OAuth 1.0a and sent with the same encoded
//! query string that was signed.
//! See: https://api.thenounproject.com/documentation.html

use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;
use utoipa::ToSchema;

use crate::errors::ApiError;
use crate::services::oauth::{self, OAuthCredentials};

/// Per-request budget for the icon provider.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// PNG downloads are only offered between these edge lengths (px).
const PNG_MIN_SIZE: u32 = 20;
const PNG_MAX_SIZE: u32 = 1200;

/// Longest slice of an error body kept in error messages.
const MAX_ERROR_BODY: usize = 200;

/// Client for the icon search provider.
#[derive(Debug, Clone)]
pub struct IconClient {
    client: reqwest::Client,
    base_url: String,
    credentials: OAuthCredentials,
}

/// Download format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Svg,
    Png,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Svg => "svg",
            FileType::Png => "png",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for the search endpoint.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: u32,
    pub thumbnail_size: u32,
    /// Exclude icons flagged by the provider.
    pub blacklist: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            thumbnail_size: 84,
            blacklist: true,
        }
    }
}

impl SearchOptions {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

/// Options for the get-by-id endpoint.
#[derive(Debug, Clone)]
pub struct IconOptions {
    pub thumbnail_size: u32,
    pub blacklist: bool,
}

impl Default for IconOptions {
    fn default() -> Self {
        Self {
            thumbnail_size: 84,
            blacklist: true,
        }
    }
}

/// A single icon as returned by search and get-by-id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Icon {
    #[serde(deserialize_with = "deserialize_icon_id")]
    pub id: String,
    #[serde(default)]
    pub attribution: String,
    #[serde(default)]
    pub license_description: String,
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

impl Icon {
    /// Thumbnail if present, else the full icon URL, else empty.
    pub fn preferred_url(&self) -> String {
        [&self.thumbnail_url, &self.icon_url]
            .into_iter()
            .flatten()
            .find(|url| !url.is_empty())
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IconSearchResponse {
    #[serde(default)]
    pub icons: Vec<Icon>,
}

#[derive(Debug, Deserialize)]
struct IconEnvelope {
    icon: Icon,
}

/// Payload of the download endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct IconDownload {
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub base64_encoded_file: Option<String>,
}

impl IconDownload {
    /// `data:<type>;base64,<payload>`, or `None` when the payload is missing.
    pub fn data_uri(&self) -> Option<String> {
        self.base64_encoded_file
            .as_deref()
            .filter(|payload| !payload.is_empty())
            .map(|payload| format!("data:{};base64,{}", self.content_type, payload))
    }
}

/// Icon ids arrive as numbers from some endpoints and strings from others.
fn deserialize_icon_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

/// Clamp a PNG size into the provider's accepted range.
pub fn clamp_png_size(size: u32) -> u32 {
    size.clamp(PNG_MIN_SIZE, PNG_MAX_SIZE)
}

impl IconClient {
    pub fn new(base_url: &str, credentials: OAuthCredentials) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Search icons by term.
    pub async fn search_icons(
        &self,
        term: &str,
        options: &SearchOptions,
    ) -> Result<IconSearchResponse, ApiError> {
        let params = vec![
            ("query".to_string(), term.to_string()),
            ("limit".to_string(), options.limit.to_string()),
            (
                "thumbnail_size".to_string(),
                options.thumbnail_size.to_string(),
            ),
            ("blacklist".to_string(), flag(options.blacklist)),
        ];

        let body = self.get_json("/icon", &params).await?;
        serde_json::from_value(body)
            .map_err(|e| ApiError::Parse(format!("icon search response structure error: {}", e)))
    }

    /// Fetch a single icon by id.
    pub async fn get_icon(&self, icon_id: &str, options: &IconOptions) -> Result<Icon, ApiError> {
        let params = vec![
            (
                "thumbnail_size".to_string(),
                options.thumbnail_size.to_string(),
            ),
            ("blacklist".to_string(), flag(options.blacklist)),
        ];

        let body = self
            .get_json(&format!("/icon/{}", icon_id), &params)
            .await?;
        serde_json::from_value::<IconEnvelope>(body)
            .map(|envelope| envelope.icon)
            .map_err(|e| ApiError::Parse(format!("icon response structure error: {}", e)))
    }

    /// Download an icon, optionally recoloured.
    ///
    /// `color` is hex without `#`. `size` only applies to PNG and is clamped
    /// to 20..=1200; it is dropped for SVG.
    pub async fn download_icon(
        &self,
        icon_id: &str,
        color: Option<&str>,
        filetype: FileType,
        size: Option<u32>,
    ) -> Result<IconDownload, ApiError> {
        let mut params = Vec::with_capacity(3);
        if let Some(color) = color.filter(|c| !c.is_empty()) {
            params.push(("color".to_string(), color.to_string()));
        }
        params.push(("filetype".to_string(), filetype.to_string()));
        if let (FileType::Png, Some(size)) = (filetype, size) {
            params.push(("size".to_string(), clamp_png_size(size).to_string()));
        }

        let body = self
            .get_json(&format!("/icon/{}/download", icon_id), &params)
            .await?;
        serde_json::from_value(body)
            .map_err(|e| ApiError::Parse(format!("icon download structure error: {}", e)))
    }

    /// Signed GET returning the parsed JSON body.
    ///
    /// Non-2xx, empty or unparsable bodies, and bodies carrying an `error`
    /// field are all failures.
    async fn get_json(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, ApiError> {
        let endpoint = format!("{}{}", self.base_url, path);
        let authorization = oauth::sign("GET", &endpoint, params, &self.credentials);

        let url = if params.is_empty() {
            endpoint
        } else {
            format!("{}?{}", endpoint, oauth::encode_query(params))
        };

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("icon provider request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ApiError::Transport(format!("icon provider body read failed: {}", e))
        })?;

        if !status.is_success() {
            return Err(ApiError::Upstream(format!(
                "icon provider returned HTTP {}: {}",
                status,
                truncate_body(&body)
            )));
        }

        if body.trim().is_empty() {
            return Err(ApiError::Parse(
                "icon provider returned an empty body".to_string(),
            ));
        }

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ApiError::Parse(format!("icon provider JSON parse error: {}", e)))?;

        if let Some(error) = value.get("error") {
            return Err(ApiError::Upstream(format!(
                "icon provider error: {}",
                error
            )));
        }

        if value.is_null() {
            return Err(ApiError::Parse(
                "icon provider returned null".to_string(),
            ));
        }

        Ok(value)
    }
}

fn flag(value: bool) -> String {
    String::from(if value { "1" } else { "0" })
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
