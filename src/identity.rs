use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::common::IdentityError;

/// Fetches per-instance display names from a remote identity endpoint.
///
/// The endpoint may answer with a bare name, a JSON string, or a JSON object
/// carrying a `name` field. Anything else, a non-success status, or an empty
/// body is a fetch error; the caller aborts the batch on it.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    http: reqwest::Client,
}

impl IdentityResolver {
    /// Create a resolver with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch one display name from the endpoint.
    pub async fn fetch(&self, endpoint: &Url) -> Result<String, IdentityError> {
        let response = self.http.get(endpoint.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::BadStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let name = extract_name(&body)?;

        debug!(name, "Fetched display name");
        Ok(name)
    }
}

/// Pull the display name out of a response body: a bare name, a JSON string,
/// or a JSON object with a `name` field.
fn extract_name(body: &str) -> Result<String, IdentityError> {
    let name = match serde_json::from_str::<Value>(body) {
        Ok(Value::String(name)) => name,
        Ok(value) => value
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(IdentityError::EmptyName)?,
        Err(_) => body.trim().to_string(),
    };

    if name.is_empty() {
        return Err(IdentityError::EmptyName);
    }

    Ok(name)
}
