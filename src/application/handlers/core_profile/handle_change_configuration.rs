//! ChangeConfiguration handler

use rust_ocpp::v1_6::messages::change_configuration::{
    ChangeConfigurationRequest, ChangeConfigurationResponse,
};
use rust_ocpp::v1_6::types::ConfigurationStatus;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;
use crate::domain::configuration::ChangeStatus;

pub async fn handle_change_configuration(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: ChangeConfigurationRequest = parse("ChangeConfiguration", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        key = req.key.as_str(),
        "ChangeConfiguration"
    );

    let status = match runtime.change_configuration(&req.key, &req.value).await {
        Ok(change) => {
            if let Some(reason) = &change.error {
                warn!(
                    key = req.key.as_str(),
                    value = req.value.as_str(),
                    error = reason.as_str(),
                    "Configuration change refused"
                );
            }
            match change.status {
                ChangeStatus::Accepted => ConfigurationStatus::Accepted,
                ChangeStatus::Rejected => ConfigurationStatus::Rejected,
                ChangeStatus::NotSupported => ConfigurationStatus::NotSupported,
            }
        }
        Err(e) => {
            error!(key = req.key.as_str(), error = %e, "Error updating configuration");
            ConfigurationStatus::Rejected
        }
    };

    respond(&ChangeConfigurationResponse { status })
}
