//! Certificate inventory handlers

use serde_json::Value;
use tracing::info;

use super::{
    CertificateSignedRequest, CertificateSignedResponse, CertificateSignedStatus,
    DeleteCertificateRequest, DeleteCertificateResponse, DeleteCertificateStatus,
    GetInstalledCertificateIdsRequest, GetInstalledCertificateIdsResponse,
    GetInstalledCertificateStatus,
};
use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;

pub async fn handle_get_installed_certificate_ids(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: GetInstalledCertificateIdsRequest = parse("GetInstalledCertificateIds", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        certificate_type = ?req.certificate_type,
        "GetInstalledCertificateIds"
    );

    respond(&GetInstalledCertificateIdsResponse {
        status: GetInstalledCertificateStatus::Accepted,
    })
}

pub async fn handle_delete_certificate(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: DeleteCertificateRequest = parse("DeleteCertificate", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        serial_number = req.certificate_hash_data.serial_number.as_str(),
        "DeleteCertificate"
    );

    respond(&DeleteCertificateResponse {
        status: DeleteCertificateStatus::Accepted,
    })
}

pub async fn handle_certificate_signed(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: CertificateSignedRequest = parse("CertificateSigned", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        chain_len = req.certificate_chain.len(),
        "CertificateSigned"
    );

    respond(&CertificateSignedResponse {
        status: CertificateSignedStatus::Accepted,
    })
}
