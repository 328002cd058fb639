//! The two HTTP entry points of the fan-out engine, plus a liveness probe.
//! `StreamEndpoint` is `stream` below; `CommandEndpoint` is `command`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::channel::Channel;
use crate::error::{AppError, Result};
use crate::listener::{new_listener_queue, ListenerId};
use crate::streamer::{Streamer, StreamerCommand, StreamerRegistry};

/// `^[A-Za-z0-9_-]{1,256}$`, hand-rolled rather than pulled in via `regex`
/// for a single-pattern check this simple.
fn valid_channel_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 256
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Detaches a listener from whichever Streamer its queue currently lives
/// under when the response body stream is dropped (client disconnect,
/// error, or shutdown) — not the Streamer it was attached to at connect
/// time, since a channel migration (`Channel::play_playlist`) may have since
/// moved the queue elsewhere. Falls back to the attach-time Streamer only if
/// the channel never points anywhere live any more.
struct DetachOnDrop {
    channel: Arc<Channel>,
    streamers: Arc<StreamerRegistry>,
    listener_id: ListenerId,
    attached_at_connect: Option<Arc<Streamer>>,
}

impl Drop for DetachOnDrop {
    fn drop(&mut self) {
        let current = self
            .channel
            .current_streamer(&self.streamers)
            .or_else(|| self.attached_at_connect.take());
        if let Some(streamer) = current {
            streamer.detach_listener(self.channel.name(), self.listener_id);
        }
        debug!(channel = %self.channel.name(), "listener detached");
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub channel: String,
}

/// `GET /stream?channel=<name>`
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Response> {
    if !valid_channel_name(&query.channel) {
        return Err(AppError::InvalidChannelName);
    }

    let channel = state.channels.get_or_create(&query.channel);
    let Some(streamer) = channel.current_streamer(&state.streamers) else {
        return Err(AppError::ChannelNotActive);
    };

    let (queue, mut consumer) = new_listener_queue(state.config.listener_queue_maxsize);
    let listener_id = ListenerId::new_v4();
    streamer.attach_listener(channel.name(), listener_id, queue);

    let poll_timeout = state.config.poll_timeout;
    let silence = state.silence.clone();
    let detach_guard = DetachOnDrop {
        channel,
        streamers: Arc::clone(&state.streamers),
        listener_id,
        attached_at_connect: Some(streamer),
    };

    let body_stream = async_stream::stream! {
        let _detach_guard = detach_guard;
        yield Ok::<_, std::io::Error>(silence.clone());
        loop {
            match consumer.poll(poll_timeout).await {
                Some(chunk) => yield Ok(chunk),
                None => yield Ok(silence.clone()),
            }
        }
    };

    let body = Body::from_stream(body_stream);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (
                header::CACHE_CONTROL,
                "no-cache, no-store, must-revalidate",
            ),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub channel: String,
    pub playlist: Option<String>,
    pub command: Option<String>,
}

/// `POST /command`. On success returns `204 No Content`; there is nothing
/// useful to report back beyond the status code itself.
pub async fn command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<Response> {
    if !valid_channel_name(&req.channel) {
        return Err(AppError::InvalidChannelName);
    }

    match (&req.playlist, &req.command) {
        (Some(_), Some(_)) => return Err(AppError::AmbiguousCommandRequest),
        (None, None) => return Err(AppError::MissingField("playlist or command")),
        _ => {}
    }

    let channel = state.channels.get_or_create(&req.channel);

    if let Some(playlist) = &req.playlist {
        channel.play_playlist(playlist, &state.streamers);
        info!(channel = %req.channel, playlist = %playlist, "channel pointed at playlist");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let command = req.command.as_deref().expect("checked above");
    let cmd = match command {
        "next" => StreamerCommand::Next,
        "stop" => StreamerCommand::Stop,
        other => return Err(AppError::UnknownCommand(other.to_string())),
    };

    channel
        .send_command(cmd, &state.streamers)
        .map_err(|_| AppError::NoActiveStreamer)?;

    info!(channel = %req.channel, command = %command, "command dispatched");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
