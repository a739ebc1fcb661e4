use reqwest::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use tracing::{debug, warn};

use super::models::{ApiError, SourceConfig};
use crate::models::Term;

/// Longest slice of an error body kept for logs
const ERROR_BODY_PREVIEW: usize = 200;

/// HTTP client for the live quote pages and the bulk yield CSV
pub struct MarketDataClient {
    http_client: HttpClient,
    config: SourceConfig,
}

impl MarketDataClient {
    pub fn new(config: SourceConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,text/csv,*/*"));
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ApiError::Setup(format!("Invalid user agent: {}", e)))?;
        headers.insert(USER_AGENT, agent);

        let mut builder = HttpClient::builder()
            .default_headers(headers)
            .timeout(config.timeout);

        if config.insecure_transport {
            warn!("⚠️ Insecure transport enabled: TLS certificates and hostnames are NOT verified");
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        let http_client = builder
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))?;

        Ok(Self { http_client, config })
    }

    pub fn quote_url(&self, term: Term) -> String {
        self.config
            .quote_url_template
            .replace("{symbol}", term.quote_symbol())
    }

    pub fn series_url(&self, year: i32) -> String {
        self.config
            .series_url_template
            .replace("{year}", &year.to_string())
    }

    fn classify(e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Transport(e.to_string())
        }
    }

    /// GET a URL and return its body as text
    async fn get_text(&self, url: &str) -> Result<String, ApiError> {
        debug!("GET {}", url);
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let preview: String = body_text.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(ApiError::HttpStatus(status.as_u16(), preview));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Body(e.to_string())
            }
        })
    }

    /// GET the live quote page for a term
    pub async fn get_quote_page(&self, term: Term) -> Result<String, ApiError> {
        self.get_text(&self.quote_url(term)).await
    }

    /// GET the bulk yield CSV for a calendar year
    pub async fn get_series_csv(&self, year: i32) -> Result<String, ApiError> {
        self.get_text(&self.series_url(year)).await
    }
}
