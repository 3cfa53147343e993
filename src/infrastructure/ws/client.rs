//! OCPP-J client session over one WebSocket

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::ports::{CentralSystemClient, ClientError, InboundHandler};
use crate::support::ocpp_frame::OcppFrame;

pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

struct PendingCall {
    action: String,
    response_sender: oneshot::Sender<Result<Value, ClientError>>,
}

type PendingCalls = Arc<DashMap<String, PendingCall>>;

/// Charge point side of an OCPP-J session.
///
/// Outbound Calls are correlated with their results by unique id. Inbound
/// Calls are answered by the registered [`InboundHandler`], each on its own
/// task so a slow handler never blocks the reader.
pub struct WsClient {
    charge_point_id: String,
    outgoing: mpsc::UnboundedSender<Message>,
    pending: PendingCalls,
    connected: Arc<AtomicBool>,
    response_timeout: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WsClient {
    /// Take ownership of an upgraded stream and start the reader and writer.
    pub fn start<S>(
        stream: WebSocketStream<S>,
        charge_point_id: impl Into<String>,
        handler: Arc<dyn InboundHandler>,
        response_timeout: Duration,
    ) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let charge_point_id = charge_point_id.into();
        let (mut ws_sender, mut ws_receiver) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let pending: PendingCalls = Arc::new(DashMap::new());
        let connected = Arc::new(AtomicBool::new(true));

        let cp_id_send = charge_point_id.clone();
        let send_connected = connected.clone();
        let send_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Message::Text(text) = &msg {
                    debug!(charge_point_id = cp_id_send.as_str(), "-> {}", text);
                }
                if let Err(e) = ws_sender.send(msg).await {
                    error!(charge_point_id = cp_id_send.as_str(), error = %e, "Send error");
                    send_connected.store(false, Ordering::SeqCst);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let cp_id_recv = charge_point_id.clone();
        let recv_pending = pending.clone();
        let recv_connected = connected.clone();
        let reply = tx.clone();
        let recv_task = tokio::spawn(async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        debug!(charge_point_id = cp_id_recv.as_str(), "<- {}", text);
                        route_frame(&text, &recv_pending, &handler, &reply);
                    }
                    Ok(Message::Close(frame)) => {
                        info!(charge_point_id = cp_id_recv.as_str(), ?frame, "Close frame received");
                        break;
                    }
                    Ok(Message::Binary(data)) => {
                        warn!(
                            charge_point_id = cp_id_recv.as_str(),
                            len = data.len(),
                            "Binary message ignored"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(charge_point_id = cp_id_recv.as_str(), error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            recv_connected.store(false, Ordering::SeqCst);
            fail_pending(&recv_pending);
            info!(charge_point_id = cp_id_recv.as_str(), "Disconnected from central system");
        });

        Arc::new(Self {
            charge_point_id,
            outgoing: tx,
            pending,
            connected,
            response_timeout,
            tasks: Mutex::new(vec![send_task, recv_task]),
        })
    }
}

fn route_frame(
    text: &str,
    pending: &PendingCalls,
    handler: &Arc<dyn InboundHandler>,
    reply: &mpsc::UnboundedSender<Message>,
) {
    let frame = match OcppFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Dropping unparseable frame");
            return;
        }
    };

    match frame {
        OcppFrame::Call {
            unique_id,
            action,
            payload,
        } => {
            let handler = handler.clone();
            let reply = reply.clone();
            tokio::spawn(async move {
                let answer = match handler.handle(&action, payload).await {
                    Ok(payload) => OcppFrame::CallResult { unique_id, payload },
                    Err(e) => OcppFrame::error_response(unique_id, e.code(), e.to_string()),
                };
                if reply.send(Message::Text(answer.serialize())).is_err() {
                    warn!(action = action.as_str(), "Connection gone before answer was sent");
                }
            });
        }
        OcppFrame::CallResult { unique_id, payload } => {
            match pending.remove(&unique_id) {
                Some((_, call)) => {
                    let _ = call.response_sender.send(Ok(payload));
                }
                None => warn!(unique_id = unique_id.as_str(), "Result for unknown call"),
            }
        }
        OcppFrame::CallError {
            unique_id,
            error_code,
            error_description,
            ..
        } => match pending.remove(&unique_id) {
            Some((_, call)) => {
                let _ = call.response_sender.send(Err(ClientError::CallError {
                    action: call.action,
                    code: error_code,
                    description: error_description,
                }));
            }
            None => warn!(unique_id = unique_id.as_str(), "Error for unknown call"),
        },
    }
}

fn fail_pending(pending: &PendingCalls) {
    let ids: Vec<String> = pending.iter().map(|entry| entry.key().clone()).collect();
    for id in ids {
        if let Some((_, call)) = pending.remove(&id) {
            let _ = call.response_sender.send(Err(ClientError::Closed));
        }
    }
}

#[async_trait]
impl CentralSystemClient for WsClient {
    async fn call(&self, action: &str, payload: Value) -> Result<Value, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let unique_id = Uuid::new_v4().to_string();
        let frame = OcppFrame::Call {
            unique_id: unique_id.clone(),
            action: action.to_string(),
            payload,
        };

        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            unique_id.clone(),
            PendingCall {
                action: action.to_string(),
                response_sender: tx,
            },
        );

        if self.outgoing.send(Message::Text(frame.serialize())).is_err() {
            self.pending.remove(&unique_id);
            return Err(ClientError::NotConnected);
        }

        match timeout(self.response_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => {
                self.pending.remove(&unique_id);
                warn!(
                    charge_point_id = self.charge_point_id.as_str(),
                    action,
                    unique_id = unique_id.as_str(),
                    "Call timed out"
                );
                Err(ClientError::Timeout {
                    action: action.to_string(),
                    timeout_secs: self.response_timeout.as_secs(),
                })
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.outgoing.send(Message::Close(None));
        }
        fail_pending(&self.pending);

        let tasks: Vec<JoinHandle<()>> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for mut task in tasks {
            if timeout(Duration::from_secs(1), &mut task).await.is_err() {
                task.abort();
            }
        }
        info!(charge_point_id = self.charge_point_id.as_str(), "Connection closed");
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for task in tasks.iter() {
                task.abort();
            }
        }
    }
}
