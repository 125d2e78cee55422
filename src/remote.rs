use crate::config::{LibraryConfig, DEFAULT_API_VERSION};
use crate::error::{ConfigError, RemoteError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

const SEARCH_SORT_ORDERS: [&str; 3] = ["default", "death", "page_id"];

/// Client for the remote catalog API. Holds no local state; each call is
/// one request with no retry.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(config: &LibraryConfig) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn get_book(
        &self,
        id: i64,
        include: Option<&str>,
        ver: u32,
    ) -> Result<Value, RemoteError> {
        let mut params = vec![("id", id.to_string()), ("ver", ver.to_string())];
        if let Some(include) = include.filter(|value| !value.trim().is_empty()) {
            params.push(("include", include.to_string()));
        }
        self.get_json("/book", &params).await
    }

    pub async fn get_page(&self, book_id: i64, page: i64, ver: u32) -> Result<Value, RemoteError> {
        let params = [
            ("book_id", book_id.to_string()),
            ("pg", page.to_string()),
            ("ver", ver.to_string()),
        ];
        self.get_json("/page", &params).await
    }

    pub async fn get_author(&self, id: i64, ver: u32) -> Result<Value, RemoteError> {
        let params = [("id", id.to_string()), ("ver", ver.to_string())];
        self.get_json("/author", &params).await
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Value, RemoteError> {
        let params = query.to_params();
        log::info!("[catalog] search params={:?}", params);
        self.get_json("/search", &params).await
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("[catalog] http start url={} params={:?}", url, params);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(params)
            .send()
            .await
            .map_err(|err| RemoteError::from_transport(&url, err))?;

        let status = response.status();
        if !status.is_success() {
            let final_url = response.url().to_string();
            let body = response.text().await.ok().filter(|text| !text.is_empty());
            log::warn!("[catalog] http status url={} status={}", final_url, status);
            return Err(RemoteError::Status {
                code: status.as_u16(),
                url: final_url,
                body,
            });
        }

        log::debug!("[catalog] http success url={} status={}", url, status);
        let body = response
            .bytes()
            .await
            .map_err(|err| RemoteError::from_transport(&url, err))?;
        serde_json::from_slice::<Value>(&body).map_err(|err| RemoteError::Unexpected {
            message: format!("invalid JSON from {}: {}", url, err),
        })
    }
}

/// Query and filters for `GET /search`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub ver: Option<u32>,
    #[serde(default)]
    pub page: Option<i64>,
    /// Comma separated book ids.
    #[serde(default)]
    pub book: Option<String>,
    /// Comma separated author ids.
    #[serde(default)]
    pub author: Option<String>,
    /// Comma separated category ids.
    #[serde(default)]
    pub cat: Option<String>,
    #[serde(default)]
    pub printed: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Author death year range such as `",700"` or `"600,750"`.
    #[serde(default)]
    pub death: Option<String>,
    #[serde(default = "default_non_author")]
    pub non_author: u8,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_precision")]
    pub precision: u8,
    #[serde(default = "default_stem")]
    pub stem: u8,
}

fn default_non_author() -> u8 {
    1
}

fn default_sort() -> String {
    "default".to_string()
}

fn default_precision() -> u8 {
    2
}

fn default_stem() -> u8 {
    1
}

impl SearchQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ver: None,
            page: None,
            book: None,
            author: None,
            cat: None,
            printed: None,
            kind: None,
            death: None,
            non_author: default_non_author(),
            sort: default_sort(),
            precision: default_precision(),
            stem: default_stem(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.q.trim().is_empty() {
            return Err("q must not be empty".to_string());
        }
        if self.non_author > 1 {
            return Err(format!("non_author must be 0 or 1, got {}", self.non_author));
        }
        if self.stem > 1 {
            return Err(format!("stem must be 0 or 1, got {}", self.stem));
        }
        if self.precision > 2 {
            return Err(format!("precision must be 0, 1 or 2, got {}", self.precision));
        }
        if !SEARCH_SORT_ORDERS.contains(&self.sort.as_str()) {
            return Err(format!(
                "sort must be one of {}, got {:?}",
                SEARCH_SORT_ORDERS.join("|"),
                self.sort
            ));
        }
        Ok(())
    }

    /// Query string parameters; defaults for `sort` and `stem` are left off.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", self.q.clone()),
            ("ver", self.ver.unwrap_or(DEFAULT_API_VERSION).to_string()),
            ("non_author", self.non_author.to_string()),
            ("precision", self.precision.to_string()),
        ];
        if self.sort != "default" {
            params.push(("sort", self.sort.clone()));
        }
        if self.stem != 1 {
            params.push(("stem", self.stem.to_string()));
        }
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        let filters = [
            ("book", &self.book),
            ("author", &self.author),
            ("cat", &self.cat),
            ("printed", &self.printed),
            ("type", &self.kind),
            ("death", &self.death),
        ];
        for (key, value) in filters {
            if let Some(value) = value {
                params.push((key, value.clone()));
            }
        }
        params
    }
}
