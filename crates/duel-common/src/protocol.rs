use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// -- Client -> Service Commands --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientCommand {
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        topic: String,
        scope: String,
        /// Minutes.
        study_time: u32,
        questions: u32,
        host_id: String,
    },
    #[serde(rename_all = "camelCase")]
    JoinRoom { user_id: String, room_code: String },

    // Readiness
    #[serde(rename_all = "camelCase")]
    Ready { room_code: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    HostReady { room_code: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    GuestReady { room_code: String, user_id: String },

    // Quiz
    #[serde(rename_all = "camelCase")]
    Score {
        room_code: String,
        user_id: String,
        score: u32,
    },
}

impl ClientCommand {
    pub fn action(&self) -> &'static str {
        match self {
            ClientCommand::CreateRoom { .. } => "createRoom",
            ClientCommand::JoinRoom { .. } => "joinRoom",
            ClientCommand::Ready { .. } => "ready",
            ClientCommand::HostReady { .. } => "hostReady",
            ClientCommand::GuestReady { .. } => "guestReady",
            ClientCommand::Score { .. } => "score",
        }
    }
}

// -- Service -> Client Events --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    // Room provisioning
    #[serde(rename_all = "camelCase")]
    RoomCreated { room_code: String },
    JoinSucc { room: RoomSnapshot },
    AlrHost { room: RoomSnapshot },

    // Peer presence and readiness
    OppJoined,
    GuestReady,
    HostReady,
    OpponentReady,

    // Start and scoring
    #[serde(rename_all = "camelCase")]
    StartGame {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_time: Option<i64>,
    },
    ScoreUpdate { score: u32 },

    // Errors
    Error { message: String },
    #[serde(rename = "internal_error")]
    InternalError { message: String },
}

/// Smallest `startGame.endTime` taken as epoch milliseconds (2001-09-09).
/// Anything below is a seconds timestamp or garbage.
pub const MIN_END_TIME_MILLIS: i64 = 1_000_000_000_000;

pub const EVENT_TYPES: [&str; 11] = [
    "roomCreated",
    "joinSucc",
    "alrHost",
    "oppJoined",
    "guestReady",
    "hostReady",
    "opponentReady",
    "startGame",
    "scoreUpdate",
    "error",
    "internal_error",
];

impl ServerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::RoomCreated { .. } => "roomCreated",
            ServerEvent::JoinSucc { .. } => "joinSucc",
            ServerEvent::AlrHost { .. } => "alrHost",
            ServerEvent::OppJoined => "oppJoined",
            ServerEvent::GuestReady => "guestReady",
            ServerEvent::HostReady => "hostReady",
            ServerEvent::OpponentReady => "opponentReady",
            ServerEvent::StartGame { .. } => "startGame",
            ServerEvent::ScoreUpdate { .. } => "scoreUpdate",
            ServerEvent::Error { .. } => "error",
            ServerEvent::InternalError { .. } => "internal_error",
        }
    }

    /// Field-level checks serde cannot express.
    fn validate(&self) -> Result<(), String> {
        match self {
            ServerEvent::RoomCreated { room_code } if room_code.trim().is_empty() => {
                Err("empty roomCode".into())
            }
            ServerEvent::JoinSucc { room } | ServerEvent::AlrHost { room } => room.validate(),
            ServerEvent::StartGame {
                end_time: Some(end_time),
            } if *end_time < MIN_END_TIME_MILLIS => {
                Err(format!("endTime {} is not epoch milliseconds", end_time))
            }
            _ => Ok(()),
        }
    }
}

/// Authoritative room state as mirrored by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    #[serde(default)]
    pub room_code: Option<String>,
    pub host_id: String,
    #[serde(default)]
    pub guest_id: Option<String>,
    pub topic: String,
    #[serde(default)]
    pub scope: String,
    /// Minutes.
    pub study_time: u32,
    #[serde(default)]
    pub questions: Option<u32>,
    #[serde(default)]
    pub generated_questions: Vec<Question>,
    #[serde(default)]
    pub host_ready: bool,
    #[serde(default)]
    pub guest_ready: bool,
    #[serde(default)]
    pub closed: bool,
}

impl RoomSnapshot {
    fn validate(&self) -> Result<(), String> {
        if self.host_id.trim().is_empty() {
            return Err("empty hostId".into());
        }
        if self.study_time == 0 {
            return Err("studyTime must be at least one minute".into());
        }
        for (i, q) in self.generated_questions.iter().enumerate() {
            q.validate().map_err(|e| format!("question {}: {}", i, e))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question", alias = "text")]
    pub text: String,
    pub options: Vec<String>,
    #[serde(rename = "answer", alias = "correctOption")]
    pub correct_option: String,
}

impl Question {
    pub fn is_correct(&self, option: &str) -> bool {
        self.correct_option == option
    }

    fn validate(&self) -> Result<(), String> {
        if self.options.len() < 2 {
            return Err("fewer than two options".into());
        }
        let unique: HashSet<&str> = self.options.iter().map(String::as_str).collect();
        if unique.len() != self.options.len() {
            return Err("duplicate options".into());
        }
        if !unique.contains(self.correct_option.as_str()) {
            return Err("answer is not one of the options".into());
        }
        Ok(())
    }
}

// -- Codec --

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),
    #[error("frame has no `type` tag")]
    MissingTag,
    #[error("unrecognized event type `{0}`")]
    UnknownType(String),
    #[error("malformed `{kind}` event: {reason}")]
    Malformed { kind: String, reason: String },
}

pub fn encode_command(cmd: &ClientCommand) -> Result<String, serde_json::Error> {
    serde_json::to_string(cmd)
}

/// Decode one inbound text frame. Fails closed: anything that is not a
/// recognized, fully populated event is an error and must be dropped.
pub fn decode_event(frame: &str) -> Result<ServerEvent, DecodeError> {
    let value: Value = serde_json::from_str(frame).map_err(DecodeError::NotJson)?;
    let kind = match value.get("type").and_then(Value::as_str) {
        Some(kind) => kind.to_string(),
        None => return Err(DecodeError::MissingTag),
    };
    if !EVENT_TYPES.contains(&kind.as_str()) {
        return Err(DecodeError::UnknownType(kind));
    }

    let event: ServerEvent = serde_json::from_value(value).map_err(|e| DecodeError::Malformed {
        kind: kind.clone(),
        reason: e.to_string(),
    })?;
    event
        .validate()
        .map_err(|reason| DecodeError::Malformed { kind, reason })?;
    Ok(event)
}
