//! TriggerMessage handler

use rust_ocpp::v1_6::messages::trigger_message::{TriggerMessageRequest, TriggerMessageResponse};
use rust_ocpp::v1_6::types::{
    ChargePointStatus, DiagnosticsStatus, MessageTrigger, TriggerMessageStatus,
};
use serde_json::Value;
use tracing::{error, info};

use crate::application::handlers::{parse, respond};
use crate::application::messages;
use crate::application::ports::{ClientError, InboundError, SharedClient};
use crate::application::runtime::{ChargePointRuntime, SharedRuntime};
use crate::infrastructure::store::schema::HEARTBEAT_INTERVAL;

/// Heartbeat, StatusNotification, DiagnosticsStatusNotification and
/// BootNotification are sent once the request is acknowledged.
pub async fn handle_trigger_message(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: TriggerMessageRequest = parse("TriggerMessage", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        requested_message = ?req.requested_message,
        connector_id = ?req.connector_id,
        "TriggerMessage"
    );

    let supported = matches!(
        req.requested_message,
        MessageTrigger::BootNotification
            | MessageTrigger::DiagnosticsStatusNotification
            | MessageTrigger::Heartbeat
            | MessageTrigger::StatusNotification
    );
    if !supported {
        return respond(&TriggerMessageResponse {
            status: TriggerMessageStatus::NotImplemented,
        });
    }

    let Some(runtime) = runtime.shared() else {
        return Err(InboundError::Internal("charge point runtime is gone".into()));
    };
    let client = match runtime.clients().require().await {
        Ok(client) => client,
        Err(_) => {
            return respond(&TriggerMessageResponse {
                status: TriggerMessageStatus::Rejected,
            })
        }
    };

    let requested = req.requested_message.clone();
    let connector_id = req.connector_id;
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        if let Err(e) = send_triggered(&runtime, client, requested.clone(), connector_id).await {
            error!(requested_message = ?requested, error = %e, "Triggered message failed");
        }
    });

    respond(&TriggerMessageResponse {
        status: TriggerMessageStatus::Accepted,
    })
}

async fn send_triggered(
    runtime: &SharedRuntime,
    client: SharedClient,
    requested: MessageTrigger,
    connector_id: Option<u32>,
) -> Result<(), ClientError> {
    match requested {
        MessageTrigger::Heartbeat => {
            messages::heartbeat(client.as_ref()).await?;
        }
        MessageTrigger::DiagnosticsStatusNotification => {
            messages::diagnostics_status_notification(client.as_ref(), DiagnosticsStatus::Idle)
                .await?;
        }
        MessageTrigger::StatusNotification => {
            let running = runtime.transactions().current().await.ok().flatten();
            let (connector_id, status) = match running {
                Some(tx) if connector_id.is_none() || connector_id == Some(tx.connector_id) => {
                    (tx.connector_id, ChargePointStatus::Charging)
                }
                _ => (connector_id.unwrap_or(0), ChargePointStatus::Available),
            };
            messages::status_notification(client.as_ref(), connector_id, status).await?;
        }
        MessageTrigger::BootNotification => {
            let response =
                messages::boot_notification(client.as_ref(), &runtime.settings().identity).await?;
            let interval = i64::from(response.interval);
            if interval > 0 {
                if let Err(e) = runtime.store().set(HEARTBEAT_INTERVAL, &interval).await {
                    error!(error = %e, "Cannot store heartbeat interval");
                }
            }
        }
        _ => {}
    }
    Ok(())
}
