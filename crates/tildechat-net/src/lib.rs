//! Native transports for tildechat
//!
//! This crate provides the request/response transport (GraphQL over HTTP via
//! `reqwest`) and the push transport (`graphql-transport-ws` via
//! `tokio-tungstenite`) that implement the transport traits from
//! `tildechat-core` on a tokio runtime.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod http;
pub mod ws;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use http::HttpTransport;
pub use ws::WsTransport;

use std::rc::Rc;

use tildechat_core::{ClientConfig, ClientError, DataClient};

/// Build a data client for `config` with both native transports.
///
/// Subscriptions spawn local tasks, so the client must be used inside a
/// `tokio::task::LocalSet`.
pub fn connect(config: &ClientConfig) -> Result<DataClient, ClientError> {
    config.validate()?;
    let request = HttpTransport::new(config)?;
    let push = WsTransport::new(config);
    Ok(DataClient::new(Rc::new(request), Rc::new(push)))
}
