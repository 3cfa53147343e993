use rand::Rng;
use rust_ocpp::v1_6::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use tracing::info;

use super::send;
use crate::application::ports::{CentralSystemClient, ClientError};

/// Static description announced in BootNotification.
#[derive(Debug, Clone)]
pub struct ChargePointIdentity {
    pub vendor: String,
    pub model: String,
    pub firmware_version: String,
}

pub async fn boot_notification(
    client: &dyn CentralSystemClient,
    identity: &ChargePointIdentity,
) -> Result<BootNotificationResponse, ClientError> {
    info!(
        vendor = identity.vendor.as_str(),
        model = identity.model.as_str(),
        "Sending BootNotification"
    );

    let request = BootNotificationRequest {
        charge_box_serial_number: None,
        charge_point_model: identity.model.clone(),
        charge_point_serial_number: Some(random_serial()),
        charge_point_vendor: identity.vendor.clone(),
        firmware_version: Some(identity.firmware_version.clone()),
        iccid: Some(random_serial()),
        imsi: None,
        meter_serial_number: Some(random_serial()),
        meter_type: Some(random_serial()),
    };

    send(client, "BootNotification", &request).await
}

fn random_serial() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
