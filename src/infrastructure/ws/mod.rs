//! WebSocket transport to the central system

mod client;
mod connector;

pub use client::{WsClient, RESPONSE_TIMEOUT};
pub use connector::{basic_auth_header, endpoint_url, tls_config, WsConnector, OCPP_SUBPROTOCOL};
