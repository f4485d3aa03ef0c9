use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("request timed out; the service may be slow or unreachable. Try increasing --timeout")]
    Timeout,

    #[error("connection failed, check your internet connection ({0})")]
    ConnectionFailed(String),

    #[error("proxy error, check your --proxy URL is correct ({0})")]
    ProxyError(String),

    #[error("TLS/SSL error while connecting ({0})")]
    TlsError(String),

    #[error("language model returned invalid JSON: {message}\nraw output:\n{raw}")]
    ExtractionFormat { raw: String, message: String },

    #[error("language model output does not match the expected schema: {message}\nraw output:\n{raw}")]
    SchemaValidation { raw: String, message: String },

    #[error("flight backend authentication failed (HTTP {status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("flight search failed (HTTP {status}): {body}")]
    BackendSearch { status: u16, body: String },

    #[error("language model request failed (HTTP {status}): {body}")]
    LanguageModel { status: u16, body: String },

    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("invalid airport code \"{0}\", must be exactly 3 letters (e.g. DEL, BLR, MAD)")]
    InvalidAirport(String),

    #[error("invalid date \"{0}\", must be YYYY-MM-DD (or START,END for a range)")]
    InvalidDate(String),

    #[error("{0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("MCP server error: {0}")]
    Mcp(String),
}

impl AgentError {
    /// Stable machine-readable label, used for JSON error output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::ProxyError(_) => "proxy_error",
            Self::TlsError(_) => "tls_error",
            Self::ExtractionFormat { .. } => "extraction_format",
            Self::SchemaValidation { .. } => "schema_validation",
            Self::Authentication { .. } => "authentication",
            Self::BackendSearch { .. } => "backend_search",
            Self::LanguageModel { .. } => "language_model",
            Self::Decode(_) => "decode_error",
            Self::InvalidAirport(_) => "invalid_airport",
            Self::InvalidDate(_) => "invalid_date",
            Self::Validation(_) => "validation_error",
            Self::Config(_) => "config_error",
            Self::Mcp(_) => "mcp_error",
        }
    }

    /// The reason class shown to end users. Never includes raw bodies.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) | Self::ProxyError(_) | Self::TlsError(_) => {
                "a network problem prevented me from reaching the flight service"
            }
            Self::ExtractionFormat { .. } => {
                "I could not read the travel details out of your request"
            }
            Self::SchemaValidation { .. } => {
                "some of the travel details in your request look invalid"
            }
            Self::Authentication { .. } => "the flight service rejected my credentials",
            Self::BackendSearch { .. } => "the flight service returned an error",
            Self::LanguageModel { .. } => "the language model is unavailable",
            Self::Decode(_) => "the flight service sent a response I could not understand",
            Self::InvalidAirport(_) | Self::InvalidDate(_) | Self::Validation(_) => {
                "the search parameters are not valid"
            }
            Self::Config(_) | Self::Mcp(_) => "the assistant is not configured correctly",
        }
    }
}

pub fn from_http_error(err: wreq::Error) -> AgentError {
    let msg = err.to_string();
    let lower = msg.to_lowercase();

    if err.is_timeout() {
        return AgentError::Timeout;
    }

    if err.is_connect() {
        return AgentError::ConnectionFailed(msg);
    }

    if lower.contains("proxy") || lower.contains("socks") {
        return AgentError::ProxyError(msg);
    }

    if lower.contains("tls") || lower.contains("ssl") || lower.contains("certificate") {
        return AgentError::TlsError(msg);
    }

    AgentError::ConnectionFailed(msg)
}
