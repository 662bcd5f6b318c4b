use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("invalid forecast input: {0}")]
    InvalidInput(String),

    #[error("forecast request failed: {0}")]
    Request(String),

    #[error("forecast model returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("malformed forecast response: {0}")]
    MalformedResponse(String),
}

impl AiError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }
}

impl From<reqwest::Error> for AiError {
    fn from(value: reqwest::Error) -> Self {
        Self::Request(value.to_string())
    }
}
