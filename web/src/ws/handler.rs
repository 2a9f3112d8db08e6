use axum::extract::ws::Message;
use events::AccessLevel;
use futures::{Stream, StreamExt};
use log::*;
use realtime::message::{ClientFrame, ServerFrame};
use realtime::transport::FrameSink;
use realtime::{ConnectionHandle, Manager};
use std::sync::Arc;
use std::time::Duration;

/// Registers a push connection and serves its read half until the client leaves, goes
/// quiet for longer than `read_idle_timeout`, or the manager drops the connection.
pub(crate) async fn run_connection<R, S>(
    mut incoming: R,
    sink: S,
    manager: Arc<Manager>,
    user_id: String,
    access_level: AccessLevel,
    read_idle_timeout: Duration,
) where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    S: FrameSink,
{
    let handle = manager.register(sink, user_id, access_level);
    let welcome = ServerFrame::welcome(handle.id().as_str(), handle.user_id(), access_level);
    if handle.send_frame(&welcome).is_err() {
        return;
    }

    loop {
        let next = tokio::select! {
            _ = handle.cancelled() => break,
            next = tokio::time::timeout(read_idle_timeout, incoming.next()) => next,
        };

        let message = match next {
            Err(_) => {
                debug!(
                    "Connection {} idle for {:?}, closing",
                    handle.id(),
                    read_idle_timeout
                );
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!("Read error on connection {}: {e}", handle.id());
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        handle.mark_alive();
        let reply = match message {
            Message::Text(text) => reply_to(&handle, text.as_str()),
            Message::Binary(_) => Some(ServerFrame::error("binary frames are not supported")),
            Message::Close(_) => break,
            // Transport pings are answered by axum; both kinds count as liveness
            Message::Ping(_) | Message::Pong(_) => None,
        };

        if let Some(reply) = reply {
            if handle.send_frame(&reply).is_err() {
                break;
            }
        }
    }

    handle.close();
}

fn reply_to(handle: &ConnectionHandle, text: &str) -> Option<ServerFrame> {
    let frame = match ClientFrame::parse(text) {
        Ok(frame) => frame,
        Err(reason) => {
            trace!("Rejected client frame on {}: {reason}", handle.id());
            return Some(ServerFrame::error(reason));
        }
    };

    Some(match frame {
        ClientFrame::Subscribe { channel } => {
            handle.subscribe(&channel);
            ServerFrame::subscribed(&channel)
        }
        ClientFrame::Unsubscribe { channel } => {
            handle.unsubscribe(&channel);
            ServerFrame::unsubscribed(&channel)
        }
        ClientFrame::Ping => ServerFrame::pong(),
    })
}
