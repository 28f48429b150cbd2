//! Inbound operation contract: requests in, correlated responses out.
//!
//! The dispatcher is the only entry point into sessions and the registry.
//! For each request it spends rate budget, fetches profile data outside any
//! lock, runs the operation under the session lock, then hands finished
//! matches to the recorder on a background task.

use crate::collaborators::{MatchRecorder, PlayerProfile, ProfileLookup};
use crate::config::AppConfig;
use crate::connection::{ConnectionId, SharedConnection};
use crate::error::{ErrorKind, SessionError};
use crate::rate_limit::RateLimiter;
use crate::registry::SessionRegistry;
use crate::session::{Identity, SessionId, SharedSession};
use crate::snapshot::MatchRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use strictly_gomoku::Mark;
use tracing::{debug, info, instrument, warn};

/// Operation names accepted on the wire.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OpName {
    /// Create a session and take a seat.
    Create,
    /// Lobby listing.
    List,
    /// Snapshot of one session.
    Get,
    /// Take (or reclaim) a seat.
    Join,
    /// Watch a session.
    Spectate,
    /// Leave a seat or stop watching.
    Leave,
    /// Give up a seat to watch.
    SwitchToSpectator,
    /// Place a stone.
    Move,
    /// Send a chat line.
    Chat,
    /// Start a new match with the same players.
    Restart,
    /// Close a session.
    Close,
    /// Receive lobby updates.
    SubscribeLobby,
    /// Stop receiving lobby updates.
    UnsubscribeLobby,
}

/// One inbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Client correlation id, echoed in the response.
    #[serde(default)]
    pub request_id: Option<u64>,
    /// Target session.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Caller identity.
    pub identity: Identity,
    /// Operation.
    pub op: OpName,
    /// Operation-specific payload.
    #[serde(default)]
    pub payload: Value,
}

impl Request {
    /// Builds a request without correlation id.
    pub fn new(identity: impl Into<Identity>, op: OpName) -> Self {
        Self {
            request_id: None,
            session_id: None,
            identity: identity.into(),
            op,
            payload: Value::Null,
        }
    }

    /// Targets a session.
    pub fn in_session(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attaches a payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attaches a correlation id.
    pub fn with_request_id(mut self, request_id: u64) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

#[derive(Debug, Deserialize)]
struct CreatePayload {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    preferred_mark: Option<Mark>,
}

#[derive(Debug, Default, Deserialize)]
struct JoinPayload {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    preferred_mark: Option<Mark>,
}

#[derive(Debug, Default, Deserialize)]
struct SpectatePayload {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovePayload {
    x: i64,
    y: i64,
}

impl MovePayload {
    fn coords(&self) -> Result<(usize, usize), SessionError> {
        let convert = |value: i64, axis: &str| {
            usize::try_from(value).map_err(|_| {
                SessionError::validation(format!(
                    "Coordinate {} must not be negative, got {}",
                    axis, value
                ))
            })
        };
        Ok((convert(self.x, "x")?, convert(self.y, "y")?))
    }
}

#[derive(Debug, Deserialize)]
struct ChatPayload {
    text: String,
}

fn parse_payload<T: DeserializeOwned>(op: OpName, payload: &Value) -> Result<T, SessionError> {
    let payload = if payload.is_null() { json!({}) } else { payload.clone() };
    serde_json::from_value(payload)
        .map_err(|e| SessionError::validation(format!("Invalid payload for '{}': {}", op, e)))
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, SessionError> {
    serde_json::to_value(value)
        .map_err(|e| SessionError::internal(format!("Failed to serialize result: {}", e)))
}

/// Error half of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

/// Response correlated with one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Echo of the request's correlation id.
    pub request_id: Option<u64>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Operation result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    /// Successful response.
    pub fn ok(request_id: Option<u64>, result: Value) -> Self {
        Self {
            request_id,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Failed response.
    pub fn err(request_id: Option<u64>, error: &SessionError) -> Self {
        Self {
            request_id,
            success: false,
            result: None,
            error: Some(ErrorBody {
                kind: error.kind,
                message: error.message.clone(),
            }),
        }
    }

    /// Error kind, if the request failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// Routes requests to the registry and sessions.
pub struct Dispatcher {
    registry: SessionRegistry,
    limiter: RateLimiter,
    recorder: Arc<dyn MatchRecorder>,
    profiles: Arc<dyn ProfileLookup>,
    admins: HashSet<Identity>,
    profile_timeout: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("limiter", &self.limiter)
            .field("admins", &self.admins)
            .field("profile_timeout", &self.profile_timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    pub fn new(
        registry: SessionRegistry,
        config: &AppConfig,
        recorder: Arc<dyn MatchRecorder>,
        profiles: Arc<dyn ProfileLookup>,
    ) -> Self {
        info!(admins = config.admins().len(), "Creating dispatcher");
        Self {
            registry,
            limiter: RateLimiter::new(*config.rate_limit()),
            recorder,
            profiles,
            admins: config.admins().iter().cloned().collect(),
            profile_timeout: config.profiles().timeout(),
        }
    }

    /// The registry this dispatcher serves.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// True if `identity` may close or restart any session.
    pub fn is_elevated(&self, identity: &str) -> bool {
        self.admins.contains(identity)
    }

    /// Handles one request from `connection`.
    ///
    /// Never fails: errors become error responses for the requester only.
    #[instrument(
        skip(self, connection, request),
        fields(conn_id = connection.id(), op = %request.op, identity = %request.identity)
    )]
    pub async fn handle(&self, connection: &SharedConnection, request: Request) -> Response {
        let request_id = request.request_id;
        match self.execute(connection, request).await {
            Ok(result) => Response::ok(request_id, result),
            Err(e) => {
                warn!(kind = %e.kind, message = %e.message, "Request failed");
                Response::err(request_id, &e)
            }
        }
    }

    /// Answers a frame that could not be decoded.
    ///
    /// Malformed frames spend rate-limit budget like any request, so a
    /// flood of them is throttled too.
    pub fn reject_malformed(&self, connection_id: ConnectionId, rejection: Response) -> Response {
        match self.limiter.check(connection_id) {
            Ok(()) => rejection,
            Err(e) => {
                debug!(conn_id = connection_id, "Malformed frame over the rate limit");
                Response::err(None, &e)
            }
        }
    }

    /// Drops a closed connection everywhere.
    #[instrument(skip(self))]
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let changed = self.registry.disconnect(connection_id);
        self.limiter.forget(connection_id);
        if changed > 0 {
            self.registry.publish_list();
        }
    }

    fn session(&self, request: &Request) -> Result<SharedSession, SessionError> {
        let id = request
            .session_id
            .as_deref()
            .ok_or_else(|| {
                SessionError::validation(format!("'{}' requires a session_id", request.op))
            })?;
        self.registry.get(id)
    }

    async fn execute(
        &self,
        connection: &SharedConnection,
        request: Request,
    ) -> Result<Value, SessionError> {
        self.limiter.check(connection.id())?;

        let identity = request.identity.trim();
        if identity.is_empty() {
            return Err(SessionError::validation("Identity must not be empty"));
        }
        let elevated = self.is_elevated(identity);

        match request.op {
            OpName::Create => {
                let payload: CreatePayload = parse_payload(request.op, &request.payload)?;
                let profile = self.profile(identity).await;
                let display_name = Self::display_name(identity, payload.display_name, &profile);

                let session = self.registry.create(&payload.name)?;
                let seated = session.with(|s| {
                    let mark = s.host(
                        identity,
                        &display_name,
                        payload.preferred_mark,
                        Some(Arc::clone(connection)),
                        profile.stats,
                    )?;
                    Ok((mark, s.snapshot()))
                });
                let (mark, snapshot) = match seated {
                    Ok(seated) => seated,
                    Err(e) => {
                        self.registry.remove(session.id());
                        return Err(e);
                    }
                };
                self.registry.publish_list();
                to_result(&json!({
                    "session_id": session.id(),
                    "mark": mark,
                    "snapshot": snapshot,
                }))
            }

            OpName::List => to_result(&self.registry.list()?),

            OpName::Get => {
                let snapshot = self.session(&request)?.snapshot()?;
                debug!(session_id = %snapshot.session_id, "Snapshot read");
                to_result(&snapshot)
            }

            OpName::Join => {
                let session = self.session(&request)?;
                let payload: JoinPayload = parse_payload(request.op, &request.payload)?;
                let profile = self.profile(identity).await;
                let display_name = Self::display_name(identity, payload.display_name, &profile);

                let (mark, snapshot) = session.with(|s| {
                    let mark = s.join(
                        identity,
                        &display_name,
                        payload.preferred_mark,
                        Some(Arc::clone(connection)),
                        profile.stats,
                    )?;
                    Ok((mark, s.snapshot()))
                })?;
                self.registry.publish_list();
                to_result(&json!({ "mark": mark, "snapshot": snapshot }))
            }

            OpName::Spectate => {
                let session = self.session(&request)?;
                let payload: SpectatePayload = parse_payload(request.op, &request.payload)?;
                let profile = self.profile(identity).await;
                let display_name = Self::display_name(identity, payload.display_name, &profile);

                let snapshot = session.with(|s| {
                    s.spectate(identity, &display_name, Some(Arc::clone(connection)))?;
                    Ok(s.snapshot())
                })?;
                self.registry.publish_list();
                to_result(&snapshot)
            }

            OpName::Leave => {
                let session = self.session(&request)?;
                session.with(|s| s.leave(identity))?;
                self.registry.publish_list();
                Ok(Value::Null)
            }

            OpName::SwitchToSpectator => {
                let session = self.session(&request)?;
                let snapshot = session.with(|s| {
                    s.switch_to_spectator(identity)?;
                    Ok(s.snapshot())
                })?;
                self.registry.publish_list();
                to_result(&snapshot)
            }

            OpName::Move => {
                let session = self.session(&request)?;
                let payload: MovePayload = parse_payload(request.op, &request.payload)?;
                let (x, y) = payload.coords()?;

                let outcome = session.with(|s| s.make_move(identity, x, y))?;
                if let Some(record) = outcome.record {
                    self.record_in_background(record);
                    self.registry.publish_list();
                }
                to_result(&outcome.snapshot)
            }

            OpName::Chat => {
                let session = self.session(&request)?;
                let payload: ChatPayload = parse_payload(request.op, &request.payload)?;
                let message = session.with(|s| s.chat(identity, &payload.text))?;
                to_result(&message)
            }

            OpName::Restart => {
                let session = self.session(&request)?;
                let snapshot = session.with(|s| s.restart(identity, elevated))?;
                self.registry.publish_list();
                to_result(&snapshot)
            }

            OpName::Close => {
                let id = request
                    .session_id
                    .as_deref()
                    .ok_or_else(|| SessionError::validation("'close' requires a session_id"))?;
                self.registry.close(id, identity, elevated)?;
                Ok(Value::Null)
            }

            OpName::SubscribeLobby => {
                to_result(&self.registry.subscribe_lobby(Arc::clone(connection))?)
            }

            OpName::UnsubscribeLobby => {
                let removed = self.registry.unsubscribe_lobby(connection.id());
                to_result(&json!({ "unsubscribed": removed }))
            }
        }
    }

    fn display_name(identity: &str, requested: Option<String>, profile: &PlayerProfile) -> String {
        requested
            .or_else(|| profile.display_name.clone())
            .unwrap_or_else(|| identity.to_string())
    }

    /// Looks up a profile, bounded by the configured timeout.
    ///
    /// Errors and timeouts degrade to an empty profile.
    async fn profile(&self, identity: &str) -> PlayerProfile {
        match tokio::time::timeout(self.profile_timeout, self.profiles.lookup(identity)).await {
            Ok(Ok(profile)) => profile.unwrap_or_default(),
            Ok(Err(e)) => {
                warn!(identity, error = %e, "Profile lookup failed");
                PlayerProfile::default()
            }
            Err(_) => {
                warn!(
                    identity,
                    timeout_ms = self.profile_timeout.as_millis() as u64,
                    "Profile lookup timed out"
                );
                PlayerProfile::default()
            }
        }
    }

    fn record_in_background(&self, record: MatchRecord) {
        let recorder = Arc::clone(&self.recorder);
        tokio::spawn(async move {
            let match_id = record.match_id.clone();
            if let Err(e) = recorder.record_match(record).await {
                warn!(match_id = %match_id, error = %e, "Failed to record match");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_request_parses_minimal_frame() {
        let frame = r#"{"identity":"alice","op":"switch_to_spectator","session_id":"0011aabb"}"#;
        let request: Request = serde_json::from_str(frame).unwrap();
        assert_eq!(request.op, OpName::SwitchToSpectator);
        assert_eq!(request.request_id, None);
        assert!(request.payload.is_null());
    }

    #[test]
    fn test_op_names_match_wire_names() {
        for op in OpName::iter() {
            let wire = serde_json::to_value(op).unwrap();
            assert_eq!(wire, Value::String(op.to_string()));
        }
    }

    #[test]
    fn test_negative_coordinates_are_validation_errors() {
        let payload: MovePayload = parse_payload(OpName::Move, &json!({"x": -1, "y": 3})).unwrap();
        assert_eq!(payload.coords().unwrap_err().kind, ErrorKind::Validation);
    }

    #[test]
    fn test_missing_payload_fields_are_validation_errors() {
        let err = parse_payload::<ChatPayload>(OpName::Chat, &Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        let join: JoinPayload = parse_payload(OpName::Join, &Value::Null).unwrap();
        assert!(join.display_name.is_none());
    }

    #[test]
    fn test_error_response_shape() {
        let response = Response::err(Some(4), &SessionError::not_found("gone"));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["kind"], "NotFound");
        assert!(value.get("result").is_none());
    }
}
