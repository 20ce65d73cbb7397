//! GraphQL over HTTP using the browser `fetch` API

use std::collections::BTreeMap;

use async_trait::async_trait;
use tildechat_core::{ClientConfig, GraphQlRequest, GraphQlResponse, RequestTransport, TransportError};
use tracing::{debug, trace};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, Response};

use crate::utils::describe_js_error;

/// Request/response transport backed by `window.fetch`
#[derive(Debug, Clone)]
pub struct FetchTransport {
    endpoint: String,
    headers: BTreeMap<String, String>,
}

impl FetchTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.http_endpoint.clone(),
            headers: config.headers.clone(),
        }
    }

    fn build_request(&self, request: &GraphQlRequest) -> Result<Request, TransportError> {
        let body = serde_json::to_string(request).map_err(|e| TransportError::Encode {
            reason: e.to_string(),
        })?;

        let headers = Headers::new().map_err(network)?;
        headers
            .set("Content-Type", "application/json")
            .map_err(network)?;
        for (name, value) in &self.headers {
            headers.set(name, value).map_err(network)?;
        }

        let init = RequestInit::new();
        init.set_method("POST");
        init.set_headers(&headers);
        init.set_body(&body.into());

        Request::new_with_str_and_init(&self.endpoint, &init).map_err(network)
    }
}

#[async_trait(?Send)]
impl RequestTransport for FetchTransport {
    async fn execute(&self, request: GraphQlRequest) -> Result<GraphQlResponse, TransportError> {
        trace!("fetch {} {:?}", self.endpoint, request.operation_name);
        let request = self.build_request(&request)?;

        let window = web_sys::window().ok_or_else(|| TransportError::network("no window available"))?;
        let response: Response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(network)?
            .dyn_into()
            .map_err(network)?;

        let body = JsFuture::from(response.text().map_err(network)?)
            .await
            .map_err(network)?
            .as_string()
            .unwrap_or_default();
        debug!("HTTP {} from {}", response.status(), self.endpoint);

        GraphQlResponse::from_http(response.status(), &body)
    }
}

fn network(value: wasm_bindgen::JsValue) -> TransportError {
    TransportError::network(describe_js_error(&value))
}
