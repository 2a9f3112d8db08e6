use crate::{extractors::caller::Caller, AppState};
use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use domain::tier::{can_access_stream_type, StreamType};
use log::*;

/// Checks that the stream referenced by `id`
///     * exists
///     * has a type the caller's clearance may watch
///  Intended to be given to axum::middleware::from_fn_with_state in the router
pub(crate) async fn viewer(
    State(app_state): State<AppState>,
    caller: Caller,
    Path(stream_id): Path<String>,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    let stream = match app_state.catalog.find(&stream_id).await {
        Ok(stream) => stream,
        Err(err) if err.is_not_found() => {
            return (StatusCode::NOT_FOUND, "NOT FOUND").into_response();
        }
        Err(err) => {
            error!("Stream lookup for {stream_id} failed: {err:?}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response();
        }
    };

    let stream_type = StreamType::from(stream.stream_type.as_str());
    if can_access_stream_type(caller.access_level(), &stream_type) {
        next.run(request).await
    } else {
        debug!(
            "Caller at {} denied {stream_type} stream {stream_id}",
            caller.access_level()
        );
        (StatusCode::FORBIDDEN, "FORBIDDEN").into_response()
    }
}
