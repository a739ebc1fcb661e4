use std::time::Duration;

/// Where and how the two public data sources are reached
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Live quote page; `{symbol}` is replaced by the term's quote symbol
    pub quote_url_template: String,
    /// Bulk yield CSV; `{year}` is replaced by the calendar year
    pub series_url_template: String,
    pub timeout: Duration,
    /// Skip certificate and hostname verification. Unsafe; opt-in only.
    pub insecure_transport: bool,
    pub user_agent: String,
}

impl SourceConfig {
    pub const DEFAULT_QUOTE_URL: &'static str = "https://www.cnbc.com/quotes/{symbol}";
    pub const DEFAULT_SERIES_URL: &'static str = "https://home.treasury.gov/resource-center/data-chart-center/interest-rates/daily-treasury-rates.csv/{year}/all?type=daily_treasury_yield_curve&field_tdr_date_value={year}&page&_format=csv";
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            quote_url_template: Self::DEFAULT_QUOTE_URL.to_string(),
            series_url_template: Self::DEFAULT_SERIES_URL.to_string(),
            timeout: Duration::from_secs(15),
            insecure_transport: false,
            user_agent: concat!("yield-digest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Failure talking to a data source
#[derive(Debug, Clone)]
pub enum ApiError {
    /// The bounded request timeout elapsed
    Timeout,
    /// Connection, TLS or protocol failure before a status was received
    Transport(String),
    /// Non-success HTTP status
    HttpStatus(u16, String),
    /// Response body could not be read
    Body(String),
    /// HTTP client could not be constructed
    Setup(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Timeout => write!(f, "Request timed out"),
            ApiError::Transport(msg) => write!(f, "Transport Error: {}", msg),
            ApiError::HttpStatus(code, msg) => write!(f, "HTTP Error ({}): {}", code, msg),
            ApiError::Body(msg) => write!(f, "Body Error: {}", msg),
            ApiError::Setup(msg) => write!(f, "Client Setup Error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}
