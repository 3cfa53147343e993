//! Administrative control surface
//!
//! - `control`: handlers driving the runtime and dumping the store
//! - `router`: route table and shared state
//! - `errors`: mapping of [`AppError`](crate::support::errors::AppError) to responses

pub mod control;
pub mod errors;
pub mod router;

pub use router::{create_control_router, ControlState, ENDPOINTS};
