use crate::error::Error;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub(crate) struct APIError(anyhow::Error);

impl APIError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<Error>() {
            Some(Error::AuthForbidden(_, _)) => StatusCode::FORBIDDEN,
            Some(Error::InvalidDNS01) => StatusCode::BAD_REQUEST,
            Some(Error::ZoneNotFound(_)) => StatusCode::NOT_FOUND,
            Some(Error::TimeoutExceeded { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Some(Error::ProviderTransport(_) | Error::NoAuthoritativeNameservers(_)) => {
                StatusCode::BAD_GATEWAY
            }
            Some(Error::JsonExtractorRejection(err)) => match err {
                JsonRejection::JsonDataError(_) => StatusCode::UNPROCESSABLE_ENTITY,
                JsonRejection::JsonSyntaxError(_) => StatusCode::BAD_REQUEST,
                JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for APIError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": format!("{}", self.0),
        }));
        (status, body).into_response()
    }
}

impl<E> From<E> for APIError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use trust_dns_client::rr::Name;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                Error::AuthForbidden("10.0.0.1".parse().unwrap(), Name::root().into()),
                StatusCode::FORBIDDEN,
            ),
            (Error::InvalidDNS01, StatusCode::BAD_REQUEST),
            (
                Error::ZoneNotFound("example.org".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                Error::TimeoutExceeded {
                    name: "_acme-challenge.example.com".to_string(),
                    waited: Duration::from_secs(600),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                Error::ProviderTransport("connection reset".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::NoAuthoritativeNameservers("example.com".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (Error::NoOwnedZones, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(APIError::from(err).status(), expected);
        }
    }
}
