//! `/events` and `/messages`: the message-channel bridge over HTTP.
//!
//! `GET /events` registers a UI context and streams server-sent events. The
//! first is `connected` with `{"clientId": ...}`; after that every log entry
//! arrives as a `log` event and every bridge reply for this context as a
//! `reply` event.
//!
//! `POST /messages?client=<id>` delivers one `{"type", "payload"?}` message
//! on behalf of that context. Any reply goes out on its event stream.

use std::{convert::Infallible, time::Duration};

use analyst_core::store::ObjectStore;
use axum::{
  Extension,
  extract::{Query, State},
  http::{Method, StatusCode, Uri},
  response::{
    IntoResponse, Response,
    sse::{Event as SseEvent, KeepAlive, Sse},
  },
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json as json_value;
use tokio_stream::StreamExt as _;

use super::{RequestId, finish, json, read_json};
use crate::{
  ApiError, AppState,
  bridge::{InboundMessage, handle_message},
  clients::{ClientId, ClientMessage},
};

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// `GET /events`
pub async fn stream<S>(
  State(state): State<AppState<S>>,
  Extension(rid): Extension<RequestId>,
  method: Method,
) -> Response
where
  S: ObjectStore + Clone + 'static,
{
  let result = if method == Method::GET {
    open_stream(&state, &rid)
  } else {
    Err(ApiError::MethodNotAllowed)
  };
  finish(&state, &rid, result)
}

fn open_stream<S: ObjectStore>(
  state: &AppState<S>,
  rid: &RequestId,
) -> Result<Response, ApiError> {
  let context = state.clients.connect();
  let client_id = context.id();

  let connected = SseEvent::default()
    .event("connected")
    .json_data(json_value!({ "clientId": client_id }))
    .map_err(|e| ApiError::Internal(e.to_string()))?;

  let messages = context.into_stream().filter_map(|message| to_event(&message));
  let events = tokio_stream::once(connected)
    .chain(messages)
    .map(Ok::<_, Infallible>);

  state
    .logger
    .info(format!("Client {client_id} connected"), Some(rid.as_str()));
  Ok(
    Sse::new(events)
      .keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("keep-alive"))
      .into_response(),
  )
}

fn to_event(message: &ClientMessage) -> Option<SseEvent> {
  match SseEvent::default().event(message.event_name()).json_data(message) {
    Ok(event) => Some(event),
    Err(e) => {
      tracing::warn!("dropping unserialisable client message: {e}");
      None
    }
  }
}

#[derive(Debug, Deserialize)]
struct MessageParams {
  client: ClientId,
}

/// `POST /messages?client=<id>`
pub async fn post_message<S>(
  State(state): State<AppState<S>>,
  Extension(rid): Extension<RequestId>,
  method: Method,
  uri: Uri,
  body: Bytes,
) -> Response
where
  S: ObjectStore + Clone + 'static,
{
  let result = deliver(&state, &method, &uri, &body).await;
  finish(&state, &rid, result)
}

async fn deliver<S: ObjectStore>(
  state: &AppState<S>,
  method: &Method,
  uri: &Uri,
  body: &Bytes,
) -> Result<Response, ApiError> {
  if *method != Method::POST {
    return Err(ApiError::MethodNotAllowed);
  }
  let Query(params) = Query::<MessageParams>::try_from_uri(uri)
    .map_err(|e| ApiError::BadRequest(format!("Invalid query: {e}")))?;
  if !state.clients.contains(params.client) {
    return Err(ApiError::NotFound("Client not found".into()));
  }

  let message: InboundMessage = read_json(body)?;
  handle_message(state, params.client, message).await;
  json(StatusCode::ACCEPTED, json_value!({ "success": true }))
}
