use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::support::errors::AppError;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.is_precondition() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::StoreError;

    #[test]
    fn preconditions_are_client_errors() {
        assert_eq!(
            AppError::NotConnected.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::AlreadyConnected.into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn store_failures_are_server_errors() {
        let err = AppError::Store(StoreError::ReadOnly("version".into()));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
