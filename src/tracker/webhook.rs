//! Icecast listener authentication webhooks.
//!
//! Icecast's URL authentication calls `listener_add` and `listener_remove`
//! hooks with a form-encoded body. A listener is admitted only when the
//! response carries `icecast-auth-user: 1`; the status code is always 200.
//!
//! A missing or malformed client id is answered without the header instead
//! of with an error status, so a bad callback can never disturb the stream.

use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Router,
};
use serde::Deserialize;

use crate::observability::metrics;
use crate::tracker::recorder::{ClientId, Recorder};

/// Form field Icecast uses for the client id.
pub const CLIENT_ID_FIELD: &str = "client";

/// Header that tells Icecast to admit the client.
pub const ICECAST_AUTH_HEADER: HeaderName = HeaderName::from_static("icecast-auth-user");

pub const LISTENER_JOINED_PATH: &str = "/listener_joined";
pub const LISTENER_LEFT_PATH: &str = "/listener_left";

#[derive(Debug, Deserialize)]
pub struct ListenerForm {
    #[serde(default)]
    client: Option<String>,
}

/// Webhook routes, still waiting for the recorder state.
pub fn routes() -> Router<Arc<Recorder>> {
    Router::new()
        .route(LISTENER_JOINED_PATH, post(listener_joined))
        .route(LISTENER_LEFT_PATH, post(listener_left))
}

async fn listener_joined(
    State(recorder): State<Arc<Recorder>>,
    form: Result<Form<ListenerForm>, FormRejection>,
) -> Response {
    match client_id(form, LISTENER_JOINED_PATH) {
        Some(id) => {
            recorder.listener_add(id);
            admit(LISTENER_JOINED_PATH)
        }
        None => deny(LISTENER_JOINED_PATH),
    }
}

async fn listener_left(
    State(recorder): State<Arc<Recorder>>,
    form: Result<Form<ListenerForm>, FormRejection>,
) -> Response {
    match client_id(form, LISTENER_LEFT_PATH) {
        Some(id) => {
            recorder.listener_remove(id);
            admit(LISTENER_LEFT_PATH)
        }
        None => deny(LISTENER_LEFT_PATH),
    }
}

fn client_id(form: Result<Form<ListenerForm>, FormRejection>, route: &'static str) -> Option<ClientId> {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            tracing::debug!(route, error = %rejection, "Unreadable webhook form");
            return None;
        }
    };

    let raw = form.client.unwrap_or_default();
    match raw.parse::<ClientId>() {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::debug!(route, field = CLIENT_ID_FIELD, error = %e, "Rejected webhook call");
            None
        }
    }
}

fn admit(route: &'static str) -> Response {
    metrics::record_webhook(route, "admit");
    (
        StatusCode::OK,
        [(ICECAST_AUTH_HEADER, HeaderValue::from_static("1"))],
    )
        .into_response()
}

fn deny(route: &'static str) -> Response {
    metrics::record_webhook(route, "deny");
    StatusCode::OK.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn app(recorder: Arc<Recorder>) -> Router {
        routes().with_state(recorder)
    }

    fn form_request(path: &str, body: &str) -> Request<Body> {
        Request::post(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn join_then_leave() {
        let recorder = Arc::new(Recorder::default());

        let res = app(recorder.clone())
            .oneshot(form_request(LISTENER_JOINED_PATH, "client=500"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get(ICECAST_AUTH_HEADER).unwrap(), "1");
        assert_eq!(recorder.listener_amount(), 1);

        let res = app(recorder.clone())
            .oneshot(form_request(LISTENER_LEFT_PATH, "client=500"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get(ICECAST_AUTH_HEADER).unwrap(), "1");
        assert_eq!(recorder.listener_amount(), 0);
        assert_eq!(recorder.pending_amount(), 0);
    }

    #[tokio::test]
    async fn bad_client_ids_are_denied() {
        let recorder = Arc::new(Recorder::default());

        for path in [LISTENER_JOINED_PATH, LISTENER_LEFT_PATH] {
            for body in ["", "client=", "client=not+an+integer", "client=-4", "other=1"] {
                let res = app(recorder.clone())
                    .oneshot(form_request(path, body))
                    .await
                    .unwrap();
                assert_eq!(res.status(), StatusCode::OK, "{path} {body:?}");
                assert!(res.headers().get(ICECAST_AUTH_HEADER).is_none(), "{path} {body:?}");
            }
        }

        assert_eq!(recorder.listener_amount(), 0);
        assert_eq!(recorder.pending_amount(), 0);
    }

    #[tokio::test]
    async fn wrong_content_type_is_denied() {
        let recorder = Arc::new(Recorder::default());
        let req = Request::post(LISTENER_JOINED_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"client":"1"}"#))
            .unwrap();

        let res = app(recorder.clone()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(ICECAST_AUTH_HEADER).is_none());
        assert_eq!(recorder.listener_amount(), 0);
    }

    #[tokio::test]
    async fn early_leave_suppresses_join() {
        let recorder = Arc::new(Recorder::default());

        let res = app(recorder.clone())
            .oneshot(form_request(LISTENER_LEFT_PATH, "client=7"))
            .await
            .unwrap();
        assert_eq!(res.headers().get(ICECAST_AUTH_HEADER).unwrap(), "1");

        let res = app(recorder.clone())
            .oneshot(form_request(LISTENER_JOINED_PATH, "client=7"))
            .await
            .unwrap();
        assert_eq!(res.headers().get(ICECAST_AUTH_HEADER).unwrap(), "1");
        assert_eq!(recorder.listener_amount(), 0);
        assert_eq!(recorder.pending_amount(), 0);
    }
}
