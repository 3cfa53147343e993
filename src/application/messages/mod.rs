//! Outbound OCPP 1.6 messages
//!
//! Each helper serializes a `rust_ocpp::v1_6` request, sends it through the
//! [`CentralSystemClient`] and parses the typed response.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::application::ports::{CentralSystemClient, ClientError};

mod boot_notification;
mod diagnostics_status;
mod heartbeat;
mod meter_values;
mod start_transaction;
mod status_notification;
mod stop_transaction;

pub use boot_notification::{boot_notification, ChargePointIdentity};
pub use diagnostics_status::diagnostics_status_notification;
pub use heartbeat::heartbeat;
pub use meter_values::meter_values;
pub use start_transaction::start_transaction;
pub use status_notification::status_notification;
pub use stop_transaction::stop_transaction;

async fn send<Req, Resp>(
    client: &dyn CentralSystemClient,
    action: &str,
    request: &Req,
) -> Result<Resp, ClientError>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let payload = serde_json::to_value(request)
        .map_err(|e| ClientError::Serialization(format!("{}: {}", action, e)))?;

    let result = client.call(action, payload).await?;

    serde_json::from_value(result).map_err(|e| ClientError::InvalidResponse {
        action: action.to_string(),
        reason: e.to_string(),
    })
}

/// Clamp an accumulator to the 32-bit meter register used on the wire.
pub(crate) fn meter_register(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}
