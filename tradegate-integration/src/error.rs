use thiserror::Error;

/// All transport boundary errors generated in `tradegate-integration`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Deserialising JSON error: {error} for payload: {payload}")]
    Deserialise {
        error: serde_json::Error,
        payload: String,
    },

    #[error("Serialising JSON error: {0}")]
    Serialise(serde_json::Error),

    #[error("SerDe Query String serialisation error: {0}")]
    QueryParams(#[from] serde_qs::Error),

    #[error("SerDe url encoding serialisation error: {0}")]
    UrlEncoded(#[from] serde_urlencoded::ser::Error),

    #[error("error parsing Url: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("HTTP request timed out")]
    HttpTimeout(reqwest::Error),

    /// REST http response error
    #[error("HTTP response (status={0}) error: {1}")]
    HttpResponse(reqwest::StatusCode, String),

    #[error("invalid credentials: {0}")]
    Credentials(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        match error {
            error if error.is_timeout() => TransportError::HttpTimeout(error),
            error => TransportError::Http(error),
        }
    }
}

impl TransportError {
    /// Serialised payload of the error, as matched on by retry classifiers.
    ///
    /// Status-code carrying variants render the code so substring and code
    /// matching can treat transport and API failures uniformly.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}
