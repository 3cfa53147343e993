//! Transaction state

/// The transaction the store currently records as running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTransaction {
    pub id: i32,
    pub connector_id: u32,
    pub id_tag: String,
}

/// In-flight lifecycle phase.
///
/// Only `Requested` and `Stopping` live in memory; `Active` and `Idle` are
/// decided by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionPhase {
    #[default]
    Idle,
    Requested,
    Active,
    Stopping,
}

impl TransactionPhase {
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Requested | Self::Stopping)
    }
}

/// Why a transaction was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// RemoteStopTransaction from the central system.
    Remote,
    /// Local trigger simulating the cable being unplugged.
    EvDisconnected,
}
