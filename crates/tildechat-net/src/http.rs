//! GraphQL over HTTP request/response transport

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tildechat_core::{ClientConfig, ConfigError, GraphQlRequest, GraphQlResponse, RequestTransport, TransportError};
use tracing::{debug, trace};
use url::Url;

/// POSTs each operation as JSON to one endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(&config.http_endpoint)
            .map_err(|e| ConfigError::Validation(format!("invalid http_endpoint: {}", e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConfigError::Validation(format!("invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ConfigError::Validation(format!("invalid value for header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Loading(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait(?Send)]
impl RequestTransport for HttpTransport {
    async fn execute(&self, request: GraphQlRequest) -> Result<GraphQlResponse, TransportError> {
        trace!("POST {} {:?}", self.endpoint, request.operation_name);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;
        debug!("HTTP {} from {}", status, self.endpoint);

        GraphQlResponse::from_http(status, &body)
    }
}
