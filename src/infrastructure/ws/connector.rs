//! Opening WebSocket connections to the central system

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async_tls_with_config, Connector as TlsConnector};
use tracing::info;

use super::client::{WsClient, RESPONSE_TIMEOUT};
use crate::application::ports::{
    ClientError, Connector, InboundHandler, SharedClient, TransportSecurity,
};

/// OCPP 1.6 WebSocket subprotocol
pub const OCPP_SUBPROTOCOL: &str = "ocpp1.6";

/// Production [`Connector`] backed by tokio-tungstenite.
pub struct WsConnector {
    response_timeout: Duration,
}

impl WsConnector {
    pub fn new() -> Self {
        Self {
            response_timeout: RESPONSE_TIMEOUT,
        }
    }

    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

/// `<central system url>/<charge point id>`
pub fn endpoint_url(central_system_url: &str, charge_point_id: &str) -> String {
    format!(
        "{}/{}",
        central_system_url.trim_end_matches('/'),
        charge_point_id
    )
}

pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// TLS client config trusting exactly the certificates in `pem`.
pub fn tls_config(pem: &str) -> Result<ClientConfig, ClientError> {
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<Result<_, _>>()
        .map_err(|e| ClientError::Transport(format!("invalid root certificate PEM: {}", e)))?;
    if certs.is_empty() {
        return Err(ClientError::Transport(
            "root certificate PEM holds no certificates".into(),
        ));
    }

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots
            .add(cert)
            .map_err(|e| ClientError::Transport(format!("unusable root certificate: {}", e)))?;
    }

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| ClientError::Transport(e.to_string()))?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(config)
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        central_system_url: &str,
        charge_point_id: &str,
        security: TransportSecurity,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<SharedClient, ClientError> {
        let url = endpoint_url(central_system_url, charge_point_id);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::Transport(format!("invalid URL {}: {}", url, e)))?;

        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(OCPP_SUBPROTOCOL));
        if let Some((username, password)) = security.credentials() {
            let value = HeaderValue::from_str(&basic_auth_header(username, password))
                .map_err(|e| ClientError::Transport(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let tls = match &security {
            TransportSecurity::BasicTls {
                root_certificates, ..
            } => Some(TlsConnector::Rustls(Arc::new(tls_config(root_certificates)?))),
            _ => None,
        };

        info!(
            charge_point_id,
            url = url.as_str(),
            security = ?security,
            "Connecting to central system"
        );
        let (stream, _response) = connect_async_tls_with_config(request, None, false, tls)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        info!(charge_point_id, "Connected to central system");

        Ok(WsClient::start(
            stream,
            charge_point_id,
            handler,
            self.response_timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
    use tokio_tungstenite::tungstenite::Message;

    use super::*;
    use crate::application::ports::InboundError;
    use tokio_tungstenite::tungstenite::http::HeaderName;

    struct EchoHandler;

    #[async_trait]
    impl InboundHandler for EchoHandler {
        async fn handle(&self, action: &str, payload: Value) -> Result<Value, InboundError> {
            match action {
                "DataTransfer" => Ok(json!({ "status": "Accepted", "data": payload["data"] })),
                other => Err(InboundError::NotImplemented(other.to_string())),
            }
        }
    }

    #[derive(Debug, Default)]
    struct Handshake {
        path: String,
        protocol: Option<String>,
        authorization: Option<String>,
    }

    /// Accepts one connection, records the handshake and hands the stream to
    /// `script`.
    async fn central_system<F, Fut>(script: F) -> (String, oneshot::Receiver<Handshake>)
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ocpp", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let seen = Arc::new(Mutex::new(Handshake::default()));
            let record = seen.clone();
            let ws = tokio_tungstenite::accept_hdr_async(
                stream,
                move |req: &Request, mut response: Response| {
                    let header = |name: HeaderName| {
                        req.headers()
                            .get(name)
                            .and_then(|v: &HeaderValue| v.to_str().ok())
                            .map(str::to_string)
                    };
                    let mut seen = record.lock().unwrap();
                    seen.path = req.uri().path().to_string();
                    seen.protocol = header(SEC_WEBSOCKET_PROTOCOL);
                    seen.authorization = header(AUTHORIZATION);
                    response.headers_mut().insert(
                        SEC_WEBSOCKET_PROTOCOL,
                        HeaderValue::from_static(OCPP_SUBPROTOCOL),
                    );
                    Ok(response)
                },
            )
            .await
            .unwrap();
            let handshake = std::mem::take(&mut *seen.lock().unwrap());
            let _ = tx.send(handshake);
            script(ws).await;
        });

        (url, rx)
    }

    #[test]
    fn endpoint_appends_identity() {
        assert_eq!(endpoint_url("ws://cs/ocpp/", "CP-1"), "ws://cs/ocpp/CP-1");
        assert_eq!(endpoint_url("ws://cs/ocpp", "CP-1"), "ws://cs/ocpp/CP-1");
    }

    #[test]
    fn basic_auth_is_base64_of_user_colon_password() {
        assert_eq!(basic_auth_header("CP-1", "secret"), "Basic Q1AtMTpzZWNyZXQ=");
    }

    #[test]
    fn garbage_pem_is_rejected() {
        assert!(tls_config("not a certificate").is_err());
    }

    #[tokio::test]
    async fn handshake_carries_subprotocol_and_credentials() {
        let (url, handshake) = central_system(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let client = WsConnector::new()
            .connect(
                &url,
                "CP-1",
                TransportSecurity::Basic {
                    username: "CP-1".into(),
                    password: "secret".into(),
                },
                Arc::new(EchoHandler),
            )
            .await
            .unwrap();

        let handshake = handshake.await.unwrap();
        assert_eq!(handshake.path, "/ocpp/CP-1");
        assert_eq!(handshake.protocol.as_deref(), Some("ocpp1.6"));
        assert_eq!(handshake.authorization.as_deref(), Some("Basic Q1AtMTpzZWNyZXQ="));
        assert!(client.is_connected());

        client.close().await;
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn plain_connection_sends_no_authorization() {
        let (url, handshake) = central_system(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let client = WsConnector::new()
            .connect(&url, "CP-2", TransportSecurity::Plain, Arc::new(EchoHandler))
            .await
            .unwrap();

        assert_eq!(handshake.await.unwrap().authorization, None);
        client.close().await;
    }

    #[tokio::test]
    async fn call_resolves_with_matching_result() {
        let (url, _) = central_system(|mut ws| async move {
            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let frame: Value = serde_json::from_str(&text).unwrap();
                let reply = json!([3, frame[1], { "currentTime": "2024-01-01T00:00:00Z" }]);
                ws.send(Message::Text(reply.to_string())).await.unwrap();
            }
        })
        .await;

        let client = WsConnector::new()
            .connect(&url, "CP-1", TransportSecurity::Plain, Arc::new(EchoHandler))
            .await
            .unwrap();

        let response = client.call("Heartbeat", json!({})).await.unwrap();
        assert_eq!(response["currentTime"], "2024-01-01T00:00:00Z");
        client.close().await;
    }

    #[tokio::test]
    async fn call_error_is_surfaced() {
        let (url, _) = central_system(|mut ws| async move {
            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let frame: Value = serde_json::from_str(&text).unwrap();
                let reply = json!([4, frame[1], "SecurityError", "bad credentials", {}]);
                ws.send(Message::Text(reply.to_string())).await.unwrap();
            }
        })
        .await;

        let client = WsConnector::new()
            .connect(&url, "CP-1", TransportSecurity::Plain, Arc::new(EchoHandler))
            .await
            .unwrap();

        let err = client
            .call("BootNotification", json!({}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::CallError {
                action: "BootNotification".into(),
                code: "SecurityError".into(),
                description: "bad credentials".into(),
            }
        );
        client.close().await;
    }

    #[tokio::test]
    async fn unanswered_call_times_out() {
        let (url, _) = central_system(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let client = WsConnector::new()
            .with_response_timeout(Duration::from_millis(50))
            .connect(&url, "CP-1", TransportSecurity::Plain, Arc::new(EchoHandler))
            .await
            .unwrap();

        let err = client.call("Heartbeat", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));
        client.close().await;
    }

    #[tokio::test]
    async fn inbound_calls_are_answered() {
        let (answers_tx, answers_rx) = oneshot::channel::<Vec<Value>>();
        let (url, _) = central_system(|mut ws| async move {
            ws.send(Message::Text(
                json!([2, "cs-1", "DataTransfer", { "vendorId": "v", "data": "ping" }]).to_string(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(json!([2, "cs-2", "ReserveNow", {}]).to_string()))
                .await
                .unwrap();

            let mut answers = Vec::new();
            while answers.len() < 2 {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        answers.push(serde_json::from_str(&text).unwrap())
                    }
                    _ => break,
                }
            }
            let _ = answers_tx.send(answers);
        })
        .await;

        let client = WsConnector::new()
            .connect(&url, "CP-1", TransportSecurity::Plain, Arc::new(EchoHandler))
            .await
            .unwrap();

        let mut answers = answers_rx.await.unwrap();
        answers.sort_by_key(|frame| frame[1].as_str().unwrap_or_default().to_string());
        assert_eq!(answers[0], json!([3, "cs-1", { "status": "Accepted", "data": "ping" }]));
        assert_eq!(answers[1][0], 4);
        assert_eq!(answers[1][2], "NotImplemented");
        client.close().await;
    }

    #[tokio::test]
    async fn server_disconnect_fails_pending_calls() {
        let (url, _) = central_system(|mut ws| async move {
            let _ = ws.next().await;
            let _ = ws.close(None).await;
        })
        .await;

        let client = WsConnector::new()
            .connect(&url, "CP-1", TransportSecurity::Plain, Arc::new(EchoHandler))
            .await
            .unwrap();

        let err = client.call("Heartbeat", json!({})).await.unwrap_err();
        assert_eq!(err, ClientError::Closed);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn unreachable_central_system_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsConnector::new()
            .connect(
                &format!("ws://{}/ocpp", addr),
                "CP-1",
                TransportSecurity::Plain,
                Arc::new(EchoHandler),
            )
            .await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
    }
}
