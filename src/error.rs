use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("JSON decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Webhook delivery rejected with status {0}")]
    Delivery(reqwest::StatusCode),
}
