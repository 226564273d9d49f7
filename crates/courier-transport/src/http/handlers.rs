//! Route handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use courier_core::{Envelope, ScriptKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::error::{HttpError, HttpResult};
use super::form::{decode_form, is_form};
use super::remote::{RemoteError, RemoteScript};
use crate::state::AppState;

/// Query parameters as received, in order.
pub type Params = Vec<(String, String)>;

/// Builds an envelope from query parameters. Keys match case-insensitively;
/// every parameter but `token` is also copied into the properties.
pub fn envelope_from_params(params: &[(String, String)]) -> Envelope {
    let mut envelope = Envelope::default();
    for (key, value) in params {
        match key.to_ascii_lowercase().as_str() {
            "token" => continue,
            "message" | "text" | "msg" => envelope.message = value.clone(),
            "channel_name" | "channel" => envelope.channel_name = value.clone(),
            "channel_id" => envelope.channel_id = value.clone(),
            "user_name" | "username" | "user" => envelope.user.name = value.clone(),
            "user_id" => envelope.user.id = value.clone(),
            "icon_url" | "icon" => envelope.icon_url = value.clone(),
            "not_mentioned" => {
                envelope.not_mentioned = matches!(value.to_ascii_lowercase().as_str(), "true" | "1")
            }
            _ => {}
        }
        envelope
            .properties
            .insert(key.clone(), Value::String(value.clone()));
    }
    envelope.user.channel_name = envelope.channel_name.clone();
    envelope.user.channel_id = envelope.channel_id.clone();
    envelope
}

fn envelope_with_body(params: &[(String, String)], body: &Bytes) -> Envelope {
    let mut envelope = envelope_from_params(params);
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() {
        envelope.message = text.to_string();
    }
    envelope
}

/// Builds the envelope of a message request. Fields of a form-encoded body
/// are appended to `params`; any other non-empty body is the message.
async fn envelope_from_request(params: &mut Params, headers: &HeaderMap, body: Bytes) -> Envelope {
    if is_form(headers) {
        params.extend(decode_form::<Params>(body).await.unwrap_or_default());
        return envelope_from_params(params);
    }
    envelope_with_body(params, &body)
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> HttpResult<T> {
    serde_json::from_slice(body).map_err(|e| HttpError::bad_request(format!("malformed body: {e}")))
}

/// Public view of a registered script.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScriptSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ScriptKind,
    pub matcher: String,
    pub description: String,
    pub example: String,
    pub trigger_on_mention: bool,
}

/// `GET /`
pub async fn list_scripts(State(state): State<AppState>) -> Json<Vec<ScriptSummary>> {
    let scripts = state
        .robot
        .scripts()
        .snapshot()
        .iter()
        .map(|s| ScriptSummary {
            name: s.name.clone(),
            kind: s.kind,
            matcher: s.matcher.clone(),
            description: s.description.clone(),
            example: s.example.clone(),
            trigger_on_mention: s.trigger_on_mention,
        })
        .collect();
    Json(scripts)
}

/// `POST /`: feeds a message into the receive pipeline.
pub async fn incoming(
    State(state): State<AppState>,
    Query(mut params): Query<Params>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<StatusCode> {
    let envelope = envelope_from_request(&mut params, &headers, body).await;
    if envelope.message.is_empty() {
        return Err(HttpError::bad_request("you must provide a message"));
    }
    debug!(channel = %envelope.channel_name, user = %envelope.user.name, "Incoming message over HTTP");
    state.robot.receive(envelope).await;
    Ok(StatusCode::OK)
}

/// `GET|POST /slash-command?token=…`
pub async fn slash_command(
    State(state): State<AppState>,
    Query(mut params): Query<Params>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Response> {
    let envelope = envelope_from_request(&mut params, &headers, body).await;
    let token_id = params
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("token"))
        .map(|(_, v)| v.as_str())
        .unwrap_or_default();
    let Some(token) = state.robot.find_command_token(token_id) else {
        return Err(HttpError::not_found(format!(
            "no slash command for token '{token_id}'"
        )));
    };

    match state.robot.dispatch_command(&token, envelope).await {
        Ok(Some(value)) => Ok(Json(value).into_response()),
        Ok(None) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => {
            error!(command = %token.command_name, error = %e, "Slash command failed");
            Err(HttpError::internal(e.to_string()))
        }
    }
}

/// Body of `/api/send` and `/api/respond`.
#[derive(Debug, Deserialize)]
pub struct OutboundRequest {
    #[serde(alias = "envelop")]
    pub envelope: Envelope,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// `POST /api/send`
pub async fn api_send(State(state): State<AppState>, body: Bytes) -> HttpResult<StatusCode> {
    let request: OutboundRequest = parse_json(&body)?;
    state
        .robot
        .send_messages(&request.envelope, &request.messages)
        .await;
    Ok(StatusCode::OK)
}

/// `POST /api/respond`
pub async fn api_respond(State(state): State<AppState>, body: Bytes) -> HttpResult<StatusCode> {
    let request: OutboundRequest = parse_json(&body)?;
    state
        .robot
        .respond_messages(&request.envelope, &request.messages)
        .await
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

#[derive(Deserialize)]
struct ScriptName {
    name: String,
}

#[derive(Serialize)]
struct ConflictBody {
    code: u16,
    message: String,
    scripts: Vec<RemoteScript>,
}

impl IntoResponse for RemoteError {
    fn into_response(self) -> Response {
        warn!(error = %self, "Remote script request rejected");
        match self {
            RemoteError::Invalid(message) => HttpError::bad_request(message).into_response(),
            RemoteError::NotFound(_) => HttpError::not_found(self.to_string()).into_response(),
            RemoteError::Conflict(scripts) => {
                let body = ConflictBody {
                    code: StatusCode::CONFLICT.as_u16(),
                    message: format!("{} remote script(s) already exist", scripts.len()),
                    scripts,
                };
                (StatusCode::CONFLICT, Json(body)).into_response()
            }
        }
    }
}

/// `GET /api/remote/scripts`
pub async fn remote_list(State(state): State<AppState>) -> Json<Vec<RemoteScript>> {
    Json(state.remote.list())
}

/// `POST /api/remote/scripts`
pub async fn remote_register(State(state): State<AppState>, body: Bytes) -> Response {
    let batch = match parse_json::<OneOrMany<RemoteScript>>(&body) {
        Ok(batch) => batch.into_vec(),
        Err(e) => return e.into_response(),
    };
    match state.remote.register(&state.robot, batch) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => e.into_response(),
    }
}

/// `PUT /api/remote/scripts`
pub async fn remote_update(State(state): State<AppState>, body: Bytes) -> Response {
    let batch = match parse_json::<OneOrMany<RemoteScript>>(&body) {
        Ok(batch) => batch.into_vec(),
        Err(e) => return e.into_response(),
    };
    match state.remote.update(&state.robot, batch) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

/// `DELETE /api/remote/scripts`
pub async fn remote_remove(State(state): State<AppState>, body: Bytes) -> Response {
    let names: Vec<String> = match parse_json::<OneOrMany<ScriptName>>(&body) {
        Ok(batch) => batch.into_vec().into_iter().map(|s| s.name).collect(),
        Err(e) => return e.into_response(),
    };
    match state.remote.remove(&state.robot, &names) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
