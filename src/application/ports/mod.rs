pub mod inbound;
pub mod outbound;

pub use inbound::{InboundError, InboundHandler};
pub use outbound::{CentralSystemClient, ClientError, Connector, SharedClient, TransportSecurity};
