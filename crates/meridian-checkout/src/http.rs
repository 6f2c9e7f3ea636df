//! # HTTP Backend
//!
//! [`CheckoutBackend`] over JSON/HTTP with `reqwest`.
//!
//! ## Request Flow
//! ```text
//! HttpBackend::tax_rate(US-CA)
//!      │
//!      ▼
//! GET {base_url}/tax-rate?country=US&state=CA
//!      │
//!      ├── 2xx  → decode TaxRate          → Ok(Some(rate))
//!      ├── 404  → no rate for destination → Ok(None)
//!      ├── 4xx/5xx → BackendError::Status
//!      └── timeout / connect → BackendError::{Timeout, Transport}
//! ```

use async_trait::async_trait;
use meridian_core::{CurrencyOption, DestinationKey, LanguageOption, ShippingRate, TaxRate};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::backend::{
    CheckoutBackend, DiscountRequest, DiscountResponse, PaymentIntent, PaymentIntentRequest,
    StockCheckRequest, StockCheckResponse,
};
use crate::config::CheckoutConfig;
use crate::error::{BackendError, BackendResult};

/// JSON client for the checkout API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    /// Creates a client rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> BackendResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(HttpBackend { client, base_url })
    }

    /// Creates a client from the `[backend]` config section.
    pub fn from_config(config: &CheckoutConfig) -> BackendResult<Self> {
        Self::new(
            &config.backend.base_url,
            Duration::from_secs(config.backend.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> BackendResult<T> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> BackendResult<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        self.send(self.client.get(url).query(query)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> BackendResult<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        self.send(self.client.post(url).json(body)).await
    }
}

fn destination_query(destination: &DestinationKey) -> Vec<(&str, &str)> {
    let mut query = vec![("country", destination.country.as_str())];
    if let Some(state) = destination.state.as_deref() {
        query.push(("state", state));
    }
    query
}

/// A 404 from `tax-rate` means the service has no rate for the destination.
fn tax_rate_or_none(result: BackendResult<TaxRate>) -> BackendResult<Option<TaxRate>> {
    match result {
        Ok(rate) => Ok(Some(rate)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

#[async_trait]
impl CheckoutBackend for HttpBackend {
    async fn currencies(&self) -> BackendResult<Vec<CurrencyOption>> {
        self.get("currencies", &[]).await
    }

    async fn languages(&self) -> BackendResult<Vec<LanguageOption>> {
        self.get("languages", &[]).await
    }

    async fn shipping_rates(&self, destination: &DestinationKey) -> BackendResult<Vec<ShippingRate>> {
        self.get("shipping-rates", &destination_query(destination))
            .await
    }

    async fn tax_rate(&self, destination: &DestinationKey) -> BackendResult<Option<TaxRate>> {
        tax_rate_or_none(
            self.get::<TaxRate>("tax-rate", &destination_query(destination))
                .await,
        )
    }

    async fn validate_discount(&self, request: &DiscountRequest) -> BackendResult<DiscountResponse> {
        self.post("discounts/validate", request).await
    }

    async fn check_stock(&self, request: &StockCheckRequest) -> BackendResult<StockCheckResponse> {
        self.post("stock/check", request).await
    }

    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> BackendResult<PaymentIntent> {
        self.post("payments/create-intent", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Answers one request with `status_line` and `body`, returns the base URL.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
        });
        format!("http://{}/api/", addr)
    }

    /// Bypasses any proxy configured in the environment.
    fn local_backend(base: &str) -> HttpBackend {
        HttpBackend {
            client: Client::builder().no_proxy().build().unwrap(),
            base_url: Url::parse(base).unwrap(),
        }
    }

    fn us_ca() -> DestinationKey {
        DestinationKey::new("US", Some("CA"))
    }

    #[test]
    fn test_tax_rate_status_mapping() {
        let not_found = BackendError::Status {
            status: 404,
            message: String::new(),
        };
        assert_eq!(tax_rate_or_none(Err(not_found)).unwrap(), None);

        let server_error = BackendError::Status {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(matches!(
            tax_rate_or_none(Err(server_error)),
            Err(BackendError::Status { status: 500, .. })
        ));

        let rate = TaxRate {
            country_code: "US".to_string(),
            state_code: Some("CA".to_string()),
            rate_percent: dec!(8),
        };
        assert_eq!(tax_rate_or_none(Ok(rate.clone())).unwrap(), Some(rate));
    }

    #[tokio::test]
    async fn test_tax_rate_not_found_over_http() {
        let base = serve_once("404 Not Found", "");
        let backend = local_backend(&base);

        assert_eq!(backend.tax_rate(&us_ca()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tax_rate_server_error_over_http() {
        let base = serve_once("500 Internal Server Error", "oops");
        let backend = local_backend(&base);

        let err = backend.tax_rate(&us_ca()).await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 500, .. }));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let backend = HttpBackend::new("https://shop.example.com/api", Duration::from_secs(5)).unwrap();
        assert_eq!(
            backend.endpoint("shipping-rates").unwrap().as_str(),
            "https://shop.example.com/api/shipping-rates"
        );
        assert_eq!(
            backend.endpoint("payments/create-intent").unwrap().as_str(),
            "https://shop.example.com/api/payments/create-intent"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpBackend::new("not a url", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, BackendError::InvalidUrl(_)));
    }

    #[test]
    fn test_destination_query() {
        let with_state = DestinationKey::new("us", Some("ca"));
        assert_eq!(
            destination_query(&with_state),
            vec![("country", "US"), ("state", "CA")]
        );

        let without_state = DestinationKey::new("DE", None);
        assert_eq!(destination_query(&without_state), vec![("country", "DE")]);
    }
}
