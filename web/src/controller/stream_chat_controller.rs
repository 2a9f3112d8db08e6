use crate::extractors::caller::Caller;
use crate::params::stream::{ChatIndexParams, ChatParams};
use crate::{AppState, Error};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use domain::chat::ChatMessage;
use log::*;

/// GET recent chat for a stream, oldest first
#[utoipa::path(
    get,
    path = "/streams/{id}/chat",
    params(
        ("id" = String, Path, description = "Stream id"),
        ChatIndexParams,
    ),
    responses(
        (status = 200, description = "Successfully retrieved chat messages", body = [ChatMessage]),
        (status = 403, description = "Caller is not cleared for the stream"),
        (status = 404, description = "Stream not found"),
        (status = 500, description = "Chat history could not be read")
    ),
    security(
        (),
        ("bearer_auth" = [])
    )
)]
pub async fn index(
    State(app_state): State<AppState>,
    Path(stream_id): Path<String>,
    Query(params): Query<ChatIndexParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET chat for stream {stream_id}, limit {:?}", params.limit);

    let messages = app_state.chat.list(&stream_id, params.limit()).await?;

    Ok(Json(messages))
}

/// POST a chat message and relay it to every viewer cleared for the stream
///
/// Without an explicit username the caller's role is shown, then `Viewer`.
#[utoipa::path(
    post,
    path = "/streams/{id}/chat",
    params(
        ("id" = String, Path, description = "Stream id"),
    ),
    request_body = ChatParams,
    responses(
        (status = 200, description = "Successfully stored and relayed the message", body = ChatMessage),
        (status = 400, description = "Empty message"),
        (status = 403, description = "Caller is not cleared for the stream"),
        (status = 404, description = "Stream not found"),
        (status = 500, description = "Message could not be stored")
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
    Json(params): Json<ChatParams>,
) -> Result<impl IntoResponse, Error> {
    let user_id = caller.viewer_id();
    let username = params.username.as_deref().or(caller.role());

    let message = app_state
        .chat
        .add(&stream_id, &user_id, username, &params.message)
        .await?;

    Ok(Json(message))
}

#[cfg(test)]
mod tests {
    use crate::controller::test_helpers::body_json;
    use crate::router::define_routes;
    use crate::test_support::{app_state, bearer};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use events::AccessLevel;
    use realtime::transport::{ChannelSink, SinkItem};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn military_token() -> String {
        bearer(json!({"user_id": "user-7", "role": "pilot", "subscription_tier": "supporter"}))
    }

    fn post_chat(stream_id: &str, body: Value, token: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/streams/{stream_id}/chat"))
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_chat(uri: &str, token: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_post_then_list() {
        let router = define_routes(app_state());

        for text in ["first", "second"] {
            let response = router
                .clone()
                .oneshot(post_chat(
                    "stream-42",
                    json!({ "message": text }),
                    Some(military_token()),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let message = body_json(response).await;
            assert_eq!(message["userId"], "user-7");
            assert_eq!(message["username"], "pilot");
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let response = router
            .oneshot(get_chat(
                "/streams/stream-42/chat?limit=abc",
                Some(military_token()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let messages = body_json(response).await;
        let texts: Vec<&str> = messages
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["message"].as_str().unwrap())
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_uncleared_callers_cannot_read_or_post_restricted_chat() {
        let router = define_routes(app_state());
        let response = router
            .clone()
            .oneshot(post_chat(
                "stream-42",
                json!({ "message": "eyes on" }),
                Some(military_token()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let civilian = bearer(json!({"user_id": "user-8", "subscription_tier": "observer"}));
        for token in [None, Some(civilian)] {
            let response = router
                .clone()
                .oneshot(get_chat("/streams/stream-42/chat", token.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);

            let response = router
                .clone()
                .oneshot(post_chat("stream-42", json!({ "message": "hi" }), token))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
    }

    #[tokio::test]
    async fn test_chat_for_unknown_stream_is_not_found() {
        let router = define_routes(app_state());

        let response = router
            .clone()
            .oneshot(get_chat("/streams/made-up/chat", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .oneshot(post_chat("made-up", json!({ "message": "hi" }), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_anonymous_chat_uses_default_username() {
        let response = define_routes(app_state())
            .oneshot(post_chat("lobby", json!({ "message": "hello" }), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let message = body_json(response).await;
        assert_eq!(message["username"], "Viewer");
        assert!(!message["userId"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let response = define_routes(app_state())
            .oneshot(post_chat("lobby", json!({ "message": "   " }), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_reaches_only_cleared_viewers() {
        let state = app_state();
        let (public_sink, mut public_rx) = ChannelSink::new();
        let (military_sink, mut military_rx) = ChannelSink::new();
        let _public = state
            .realtime
            .register(public_sink, "viewer".to_string(), AccessLevel::Public);
        let _military = state
            .realtime
            .register(military_sink, "officer".to_string(), AccessLevel::Military);

        let response = define_routes(state)
            .oneshot(post_chat(
                "stream-42",
                json!({ "message": "classified" }),
                Some(military_token()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        match military_rx.recv().await {
            Some(SinkItem::Text(text)) => {
                let frame: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(frame["type"], "stream_chat");
                assert_eq!(frame["payload"]["message"], "classified");
            }
            other => panic!("expected a chat frame, got {other:?}"),
        }
        assert!(public_rx.try_recv().is_err());
    }
}
