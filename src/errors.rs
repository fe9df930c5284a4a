use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to fetch remote flag: {0}")]
    RemoteFlag(String),

    #[error("Failed to reach metrics endpoint: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Failed to build destination URL: {0}")]
    UrlBuild(String),

    #[error("Failed to access persisted destination: {0}")]
    Persistence(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Permission request failed: {0}")]
    Permission(String),
}

impl From<reqwest::Error> for LaunchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            LaunchError::Decode(error.to_string())
        } else {
            LaunchError::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for LaunchError {
    fn from(error: serde_json::Error) -> Self {
        LaunchError::Decode(error.to_string())
    }
}

impl From<std::io::Error> for LaunchError {
    fn from(error: std::io::Error) -> Self {
        LaunchError::Persistence(error.to_string())
    }
}
