//! Store connection settings.

use std::env;

/// Where the store lives and how tables are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Custom endpoint URL (for local DynamoDB).
    pub endpoint_url: Option<String>,
    pub region: String,
    /// Prepended to every table name, e.g. `dev-`.
    pub table_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl StoreConfig {
    pub const DEFAULT_REGION: &'static str = "us-east-1";

    /// Reads `AWS_ENDPOINT_URL`, `AWS_REGION` and `DYNAMAP_TABLE_PREFIX`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            endpoint_url: lookup("AWS_ENDPOINT_URL").filter(|url| !url.is_empty()),
            region: lookup("AWS_REGION")
                .filter(|region| !region.is_empty())
                .unwrap_or_else(|| Self::DEFAULT_REGION.to_string()),
            table_prefix: lookup("DYNAMAP_TABLE_PREFIX").unwrap_or_default(),
        }
    }

    /// Returns a display string for the target environment.
    pub fn target_display(&self) -> String {
        match &self.endpoint_url {
            Some(url) => format!("Local DynamoDB ({url})"),
            None => format!("AWS DynamoDB (region: {})", self.region),
        }
    }

    /// Creates a DynamoDB client from the default provider chain.
    #[cfg(feature = "dynamodb")]
    pub async fn connect(&self) -> aws_sdk_dynamodb::Client {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()));

        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        tracing::debug!(target = %self.target_display(), "connected store client");
        aws_sdk_dynamodb::Client::new(&sdk_config)
    }

    #[cfg(feature = "dynamodb")]
    pub async fn sdk_store(&self) -> crate::store::SdkStore {
        crate::store::SdkStore::new(self.connect().await)
    }
}
