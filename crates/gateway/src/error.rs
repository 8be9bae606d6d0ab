use {
    axum::{
        Json,
        extract::rejection::JsonRejection,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde_json::json,
    zahra_whatsapp::{DeliveryFailure, SendError},
};

/// JSON error body `{"error": ...}` with a status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "missing or invalid API token")
    }
}

impl From<SendError> for ApiError {
    fn from(err: SendError) -> Self {
        let status = match &err {
            SendError::NotConnected => StatusCode::BAD_REQUEST,
            SendError::InvalidRecipient(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SendError::DeliveryFailed(DeliveryFailure::Transport(_)) => StatusCode::BAD_GATEWAY,
            SendError::DeliveryFailed(DeliveryFailure::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::time::Duration};

    #[test]
    fn send_errors_map_to_status() {
        let cases = [
            (SendError::NotConnected, StatusCode::BAD_REQUEST),
            (
                SendError::InvalidRecipient("recipient is empty".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                SendError::DeliveryFailed(DeliveryFailure::Transport("boom".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                SendError::DeliveryFailed(DeliveryFailure::Timeout(Duration::from_secs(1))),
                StatusCode::GATEWAY_TIMEOUT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }
}
