use crate::extractors::caller::Caller;
use crate::params::stream::SessionTokenParams;
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::stream_session::SessionDescriptor;
use log::*;

/// POST issue a stream session for the caller
///
/// Anonymous viewers are issued sessions under a fresh viewer id.
#[utoipa::path(
    post,
    path = "/streams/{id}/session",
    params(
        ("id" = String, Path, description = "Stream id to watch"),
    ),
    responses(
        (status = 200, description = "Successfully issued a stream session", body = SessionDescriptor),
        (status = 403, description = "Caller is not cleared for the stream"),
        (status = 404, description = "Stream not found"),
        (status = 500, description = "Session could not be stored")
    ),
    security(
        (),
        ("bearer_auth" = [])
    )
)]
pub async fn create(
    caller: Caller,
    State(app_state): State<AppState>,
    Path(stream_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let user_id = caller.viewer_id();
    debug!("POST stream session on {stream_id} for {user_id}");

    let descriptor = app_state
        .sessions
        .create_session(&stream_id, &user_id)
        .await?;

    Ok(Json(descriptor))
}

/// POST end a session early
///
/// Requires the session's token, so only its holder can revoke it. Unknown, expired
/// and mismatched sessions are all rejected with the same 401.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/revoke",
    params(
        ("session_id" = String, Path, description = "Session id from the issued descriptor"),
    ),
    request_body = SessionTokenParams,
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Session unknown, expired or token rejected")
    )
)]
pub async fn revoke(
    State(app_state): State<AppState>,
    Path(session_id): Path<String>,
    Json(params): Json<SessionTokenParams>,
) -> Result<impl IntoResponse, Error> {
    let grant = app_state
        .sessions
        .validate_session(&session_id, &params.token)
        .await?;
    app_state.sessions.revoke_session(grant.session_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::controller::test_helpers::{body_json, body_text};
    use crate::router::define_routes;
    use crate::test_support::{app_state, bearer};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn create_session(stream_id: &str, claims: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/streams/{stream_id}/session"));
        if let Some(claims) = claims {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", bearer(claims)));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn issue(router: &Router) -> Value {
        let response = router
            .clone()
            .oneshot(create_session(
                "stream-42",
                Some(json!({"user_id": "user-7", "role": "military"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    #[tokio::test]
    async fn test_create_returns_a_descriptor() {
        let router = define_routes(app_state());
        let descriptor = issue(&router).await;

        assert_eq!(descriptor["streamId"], "stream-42");
        assert_eq!(descriptor["authToken"].as_str().unwrap().len(), 64);
        assert_eq!(descriptor["signalingUrl"], "ws://localhost:8080/ws/signaling");
        assert_eq!(descriptor["iceServers"][0]["urls"][0], "stun:stun.l.google.com:19302");
    }

    #[tokio::test]
    async fn test_create_requires_clearance_for_the_stream_type() {
        let router = define_routes(app_state());

        let anonymous = router
            .clone()
            .oneshot(create_session("stream-42", None))
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::FORBIDDEN);

        let civilian = router
            .clone()
            .oneshot(create_session(
                "stream-42",
                Some(json!({"user_id": "user-8", "role": "civilian"})),
            ))
            .await
            .unwrap();
        assert_eq!(civilian.status(), StatusCode::FORBIDDEN);

        // Unknown stream types are public
        let lobby = router.oneshot(create_session("lobby", None)).await.unwrap();
        assert_eq!(lobby.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_for_unknown_stream_is_not_found() {
        let response = define_routes(app_state())
            .oneshot(create_session("missing", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_validation_is_not_routed() {
        let router = define_routes(app_state());
        let descriptor = issue(&router).await;
        let session_id = descriptor["sessionId"].as_str().unwrap();

        let response = router
            .oneshot(post(
                &format!("/sessions/{session_id}/validate"),
                json!({ "token": descriptor["authToken"] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_revoke_only_once() {
        let router = define_routes(app_state());
        let descriptor = issue(&router).await;
        let session_id = descriptor["sessionId"].as_str().unwrap().to_string();
        let token = descriptor["authToken"].clone();

        let response = router
            .clone()
            .oneshot(post(
                &format!("/sessions/{session_id}/revoke"),
                json!({ "token": token }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .oneshot(post(
                &format!("/sessions/{session_id}/revoke"),
                json!({ "token": token }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_token_and_unknown_session_are_indistinguishable() {
        let router = define_routes(app_state());
        let descriptor = issue(&router).await;
        let session_id = descriptor["sessionId"].as_str().unwrap();

        let wrong = router
            .clone()
            .oneshot(post(
                &format!("/sessions/{session_id}/revoke"),
                json!({ "token": "00".repeat(32) }),
            ))
            .await
            .unwrap();

        let unknown = router
            .clone()
            .oneshot(post(
                &format!("/sessions/{}/revoke", uuid::Uuid::new_v4()),
                json!({ "token": "00".repeat(32) }),
            ))
            .await
            .unwrap();

        let malformed = router
            .oneshot(post(
                "/sessions/not-a-uuid/revoke",
                json!({ "token": "00".repeat(32) }),
            ))
            .await
            .unwrap();

        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);

        let wrong = body_text(wrong).await;
        assert_eq!(wrong, body_text(unknown).await);
        assert_eq!(wrong, body_text(malformed).await);
    }
}
