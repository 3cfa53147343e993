//! Configuration keys the charge point understands.

pub const SECURITY_PROFILE: &str = "SecurityProfile";
pub const AUTHORIZATION_KEY: &str = "AuthorizationKey";
pub const HEARTBEAT_INTERVAL: &str = "HeartbeatInterval";
pub const METER_VALUE_SAMPLE_INTERVAL: &str = "MeterValueSampleInterval";
pub const METER_VALUES_SAMPLED_DATA: &str = "MeterValuesSampledData";
pub const CERTIFICATE_STORE_MAX_LENGTH: &str = "CertificateStoreMaxLength";

/// Every key ChangeConfiguration and GetConfiguration accept.
pub const SUPPORTED_KEYS: &[&str] = &[
    "AuthorizeRemoteTxRequests",
    "AuthorizationCacheEnabled",
    "ClockAlignedDataInterval",
    "ConnectionTimeOut",
    "ConnectorPhaseRotation",
    "GetConfigurationMaxKeys",
    HEARTBEAT_INTERVAL,
    "LocalAuthorizeOffline",
    "LocalPreAuthorize",
    "MeterValuesAlignedData",
    METER_VALUES_SAMPLED_DATA,
    METER_VALUE_SAMPLE_INTERVAL,
    "NumberOfConnectors",
    "ResetRetries",
    "StopTransactionOnEVSideDisconnect",
    "StopTransactionOnInvalidId",
    "StopTxnAlignedData",
    "StopTxnSampledData",
    "SupportedFeatureProfiles",
    "TransactionMessageAttempts",
    "TransactionMessageRetryInterval",
    "UnlockConnectorOnEVSideDisconnect",
    "WebSocketPingInterval",
    "LocalAuthListEnabled",
    "LocalAuthListMaxLength",
    "SendLocalListMaxLength",
    "ChargeProfileMaxStackLevel",
    "ChargingScheduleAllowedChargingRateUnit",
    "ChargingScheduleMaxPeriods",
    "MaxChargingProfilesInstalled",
    "SupportedFileTransferProtocols",
    SECURITY_PROFILE,
    "CpoName",
    "AdditionalRootCertificateCheck",
    CERTIFICATE_STORE_MAX_LENGTH,
    AUTHORIZATION_KEY,
];

/// Values written at first boot when the key is absent.
pub const DEFAULTS: &[(&str, &str)] = &[
    (SECURITY_PROFILE, "0"),
    (METER_VALUE_SAMPLE_INTERVAL, "300"),
    (METER_VALUES_SAMPLED_DATA, "Energy.Active.Import.Register"),
    (CERTIFICATE_STORE_MAX_LENGTH, "1"),
    (HEARTBEAT_INTERVAL, "300"),
];

/// Keys whose values must be integers.
const INTEGER_KEYS: &[&str] = &[
    "ClockAlignedDataInterval",
    "ConnectionTimeOut",
    "GetConfigurationMaxKeys",
    HEARTBEAT_INTERVAL,
    METER_VALUE_SAMPLE_INTERVAL,
    "NumberOfConnectors",
    "ResetRetries",
    "TransactionMessageAttempts",
    "TransactionMessageRetryInterval",
    "WebSocketPingInterval",
    "LocalAuthListMaxLength",
    "SendLocalListMaxLength",
    "ChargeProfileMaxStackLevel",
    "ChargingScheduleMaxPeriods",
    "MaxChargingProfilesInstalled",
    CERTIFICATE_STORE_MAX_LENGTH,
];

pub fn is_supported(key: &str) -> bool {
    SUPPORTED_KEYS.contains(&key)
}

/// Reject values the runtime could not decode later.
pub fn check_value(key: &str, value: &str) -> Result<(), String> {
    if !INTEGER_KEYS.contains(&key) {
        return Ok(());
    }
    match value.trim().parse::<i64>() {
        Ok(n) if n >= 0 => Ok(()),
        Ok(_) => Err(format!("{} must not be negative, got {}", key, value)),
        Err(_) => Err(format!("{} expects an integer, got {:?}", key, value)),
    }
}

/// Result of a ChangeConfiguration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Accepted,
    Rejected,
    NotSupported,
}

/// Answer to a GetConfiguration request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationReport {
    pub known: Vec<(String, String)>,
    pub unknown: Vec<String>,
}
