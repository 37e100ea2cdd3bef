//! Provider availability probe against the proxy's health endpoint.

use serde::Deserialize;

use crate::client::StreamError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderHealth {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub claude: ProviderHealth,
    #[serde(default)]
    pub groq: ProviderHealth,
}

impl HealthStatus {
    pub fn any_available(&self) -> bool {
        self.claude.available || self.groq.available
    }
}

/// GET `{base_url}/api/health`. A 503 still carries a parseable body (no
/// provider configured), so any JSON body is accepted.
pub async fn check_health(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<HealthStatus, StreamError> {
    let response = client
        .get(format!("{base_url}/api/health"))
        .send()
        .await
        .map_err(|e| StreamError::Network(e.to_string()))?;

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str(&body).map_err(|_| StreamError::Api {
        status,
        message: "Malformed health response".into(),
    })
}
