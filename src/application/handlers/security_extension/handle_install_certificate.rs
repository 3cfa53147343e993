//! InstallCertificate handler

use serde_json::Value;
use tracing::{error, info, warn};

use super::{
    CertificateStatus, CertificateUse, InstallCertificateRequest, InstallCertificateResponse,
};
use crate::application::handlers::{parse, respond};
use crate::application::ports::InboundError;
use crate::application::runtime::ChargePointRuntime;
use crate::application::services::security::CertificateInstall;

/// Stores a central system root certificate as the TLS trust anchor.
pub async fn handle_install_certificate(
    runtime: &ChargePointRuntime,
    payload: &Value,
) -> Result<Value, InboundError> {
    let req: InstallCertificateRequest = parse("InstallCertificate", payload)?;

    info!(
        charge_point_id = runtime.settings().charge_point_id.as_str(),
        certificate_type = ?req.certificate_type,
        "InstallCertificate"
    );

    if req.certificate_type == CertificateUse::ManufacturerRootCertificate {
        warn!("ManufacturerRootCertificate installation is not supported");
        return respond(&InstallCertificateResponse {
            status: CertificateStatus::Rejected,
        });
    }

    let status = match runtime
        .security()
        .install_root_certificate(&req.certificate)
        .await
    {
        Ok(CertificateInstall::Installed) => CertificateStatus::Accepted,
        Ok(CertificateInstall::StoreFull) => CertificateStatus::Rejected,
        Err(e) => {
            error!(error = %e, "Failed to install certificate");
            CertificateStatus::Failed
        }
    };

    respond(&InstallCertificateResponse { status })
}
