use anyhow::Context;
use zeroize::Zeroizing;

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Source of OAuth2 access tokens for calls to Google APIs.
#[derive(Clone)]
pub enum TokenSource {
    /// A fixed bearer token, typically from `gcloud auth print-access-token`.
    Static(Zeroizing<String>),
    /// Tokens of the runtime service account, fetched from the metadata
    /// server on every call. The metadata server caches them itself.
    Metadata { url: url::Url },
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("Static(<redacted>)"),
            TokenSource::Metadata { url } => f
                .debug_struct("Metadata")
                .field("url", &url.as_str())
                .finish(),
        }
    }
}

impl TokenSource {
    pub fn fixed(token: impl Into<String>) -> Self {
        TokenSource::Static(Zeroizing::new(token.into()))
    }

    pub async fn access_token(&self, http: &reqwest::Client) -> anyhow::Result<Zeroizing<String>> {
        let url = match self {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Metadata { url } => url,
        };

        #[derive(serde::Deserialize)]
        struct Response {
            access_token: String,
        }

        let response = http
            .get(url.clone())
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("requesting access token from metadata server")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("metadata server token request failed ({status}): {error_text}");
        }

        let Response { access_token } = response
            .json()
            .await
            .context("failed to parse metadata server token response")?;

        Ok(Zeroizing::new(access_token))
    }
}
