use async_trait::async_trait;
use tracing::debug;

use crate::source::{FetchError, RatesResponse, RatesSource};

pub const DEFAULT_BASE_URL: &str = "https://developers.paysera.com/tasks/api";

/// Fetches the full rate table from the Paysera task endpoint.
pub struct PayseraRatesSource {
    base_url: String,
}

impl PayseraRatesSource {
    pub fn new(base_url: &str) -> Self {
        PayseraRatesSource {
            base_url: base_url.to_string(),
        }
    }
}

#[async_trait]
impl RatesSource for PayseraRatesSource {
    async fn fetch_rates(&self) -> Result<RatesResponse, FetchError> {
        let url = format!("{}/currency-exchange-rates", self.base_url);
        debug!("Requesting exchange rates from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("currex/0.1")
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        let response = client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Api(format!(
                "HTTP error: {} from {}",
                response.status(),
                url
            )));
        }

        let text = response.text().await?;
        let rates: RatesResponse = serde_json::from_str(&text)
            .map_err(|e| FetchError::Api(format!("Failed to parse rates response: {e}")))?;

        debug!(
            base = %rates.base,
            quotes = rates.rates.len(),
            "Received rates response"
        );
        Ok(rates)
    }
}
