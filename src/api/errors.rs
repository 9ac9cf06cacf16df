use actix_web::error::{InternalError, JsonPayloadError, PathError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

use crate::domain::order::{FieldErrors, OrderError};

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: &'a str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<&'a FieldErrors>,
}

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self {
            OrderError::Validation(_) | OrderError::EmptyOrder => StatusCode::BAD_REQUEST,
            OrderError::InvalidState(_) | OrderError::ProductUnavailable(_) => StatusCode::CONFLICT,
            OrderError::NotFound { .. } => StatusCode::NOT_FOUND,
            OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // storage details stay in the logs
        let message = match self {
            OrderError::Store(e) => {
                tracing::error!(error = %e, "Storage failure while handling request");
                "Internal server error".to_string()
            }
            OrderError::Validation(_) => "Invalid input".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            code: self.code(),
            message,
            fields: self.field_errors(),
        })
    }
}

/// Malformed JSON bodies get the same error shape as domain validation.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorBody {
        code: "invalid_request",
        message: err.to_string(),
        fields: None,
    });
    InternalError::from_response(err, response).into()
}

/// Ids that are not UUIDs cannot name anything that exists.
pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::NotFound().json(ErrorBody {
        code: "not_found",
        message: "Not found".to_string(),
        fields: None,
    });
    InternalError::from_response(err, response).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::ProductRef;
    use crate::store::StoreError;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        let validation = OrderError::Validation(FieldErrors::single("quantity", "too big"));
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(OrderError::EmptyOrder.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            OrderError::InvalidState("paid".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            OrderError::ProductUnavailable(ProductRef::Flower(Uuid::new_v4())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            OrderError::order_not_found(Uuid::new_v4()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            OrderError::Store(StoreError::Corrupt("x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_body_carries_code_and_fields() {
        let err = OrderError::Validation(FieldErrors::single("flower", "Either flower or bouquet must be set."));
        let body = ErrorBody {
            code: err.code(),
            message: "Invalid input".to_string(),
            fields: err.field_errors(),
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["code"], "validation_error");
        assert_eq!(json["fields"]["flower"][0], "Either flower or bouquet must be set.");
    }

    #[test]
    fn test_body_omits_fields_when_absent() {
        let body = ErrorBody {
            code: "empty_order",
            message: OrderError::EmptyOrder.to_string(),
            fields: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("fields").is_none());
    }
}
