use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::countdown::{Clock, CountdownAnchor, Urgency};
use crate::protocol::{ClientCommand, Question, RoomSnapshot, ServerEvent};
use crate::quiz::AnswerFeedback;
use crate::relay::{LeadChange, ScoreRelay};
use crate::setup::{DuelSettings, ValidationError};

// -- Data Model --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Host,
    Guest,
}

/// Client-side mirror of the room. Only server-confirmed fields are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub room_code: String,
    pub topic: String,
    pub scope: String,
    pub study_time_minutes: u32,
    pub question_count: u32,
    pub generated_questions: Vec<Question>,
    pub host_id: String,
    pub guest_id: Option<String>,
    pub host_ready: bool,
    pub guest_ready: bool,
    pub closed: bool,
}

impl Session {
    fn provisioned(room_code: String, settings: &DuelSettings, host_id: &str) -> Self {
        Self {
            room_code,
            topic: settings.topic.trim().to_string(),
            scope: settings.scope.trim().to_string(),
            study_time_minutes: settings.study_time_minutes,
            question_count: settings.question_count,
            host_id: host_id.to_string(),
            ..Self::default()
        }
    }

    /// Merge an authoritative snapshot. Ready flags and `closed` only ever
    /// move to true; the question set is kept once `questions_locked`.
    fn apply_snapshot(&mut self, snap: &RoomSnapshot, questions_locked: bool) {
        if let Some(code) = &snap.room_code {
            self.room_code = code.clone();
        }
        self.host_id = snap.host_id.clone();
        if snap.guest_id.is_some() {
            self.guest_id = snap.guest_id.clone();
        }
        self.topic = snap.topic.clone();
        if !snap.scope.is_empty() {
            self.scope = snap.scope.clone();
        }
        self.study_time_minutes = snap.study_time;
        if !(questions_locked && !self.generated_questions.is_empty()) {
            self.generated_questions = snap.generated_questions.clone();
        }
        self.question_count = snap
            .questions
            .unwrap_or(self.generated_questions.len() as u32);
        self.host_ready |= snap.host_ready;
        self.guest_ready |= snap.guest_ready;
        self.closed |= snap.closed;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalPlayerState {
    role: Option<Role>,
    pub ready: bool,
    pub score: u32,
    pub streak: u32,
}

impl LocalPlayerState {
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// First resolution wins; later calls are no-ops.
    fn resolve_role(&mut self, role: Role) -> Role {
        *self.role.get_or_insert(role)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerState {
    pub connected: bool,
    pub ready: bool,
    pub score: u32,
}

// -- State Machine --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connecting,
    AwaitingRoomConfirmation,
    WaitingForPeer,
    BothReady,
    InProgress,
    Completed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Quiz,
    Leave,
}

/// User-facing signals. Presentation decides how to show them.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    RoomCreated { room_code: String },
    RoomJoined { role: Role },
    PeerJoined,
    PeerReady,
    CountdownStarted(CountdownAnchor),
    LeadChanged(LeadChange),
    ServiceError(String),
    RoomClosed,
    ChannelLost,
}

/// Work the controller asks its owner to perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    OpenChannel,
    Send(ClientCommand),
    StartCountdown(CountdownAnchor),
    StopCountdown,
    CloseChannel,
    Navigate(Destination),
    Notify(Notice),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("this room has been closed")]
    RoomClosed,
    #[error("already in a room")]
    AlreadyInRoom,
    #[error("not in a room yet")]
    NotInRoom,
    #[error("room code is empty")]
    EmptyRoomCode,
    #[error("invalid duel settings")]
    Validation(Vec<ValidationError>),
}

#[derive(Debug, Clone)]
enum Intent {
    Host(DuelSettings),
    Guest(String),
}

/// Reducer for one duel session. Every input is applied against the latest
/// state and answered with the effects it causes.
pub struct RoomSessionController {
    user_id: String,
    clock: Arc<dyn Clock>,
    phase: SessionPhase,
    intent: Option<Intent>,
    pending: Vec<ClientCommand>,
    session: Option<Session>,
    local: LocalPlayerState,
    peer: PeerState,
    anchor: Option<CountdownAnchor>,
    start_confirmed: bool,
    relay: Option<ScoreRelay>,
    torn_down: bool,
}

impl RoomSessionController {
    pub fn new(user_id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            user_id: user_id.into(),
            clock,
            phase: SessionPhase::Idle,
            intent: None,
            pending: Vec::new(),
            session: None,
            local: LocalPlayerState::default(),
            peer: PeerState::default(),
            anchor: None,
            start_confirmed: false,
            relay: None,
            torn_down: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Option<Role> {
        self.local.role()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn local(&self) -> &LocalPlayerState {
        &self.local
    }

    pub fn peer(&self) -> &PeerState {
        &self.peer
    }

    pub fn anchor(&self) -> Option<CountdownAnchor> {
        self.anchor
    }

    pub fn remaining_seconds(&self) -> Option<u64> {
        let now = self.clock.now_millis();
        self.anchor.map(|a| a.remaining_seconds(now))
    }

    pub fn urgency(&self) -> Option<Urgency> {
        self.remaining_seconds().map(Urgency::from_remaining)
    }

    pub fn lead_change_active(&self) -> bool {
        let now = self.clock.now_millis();
        self.relay
            .as_ref()
            .map(|r| r.lead_change_active(now))
            .unwrap_or(false)
    }

    pub fn questions(&self) -> &[Question] {
        self.session
            .as_ref()
            .map(|s| s.generated_questions.as_slice())
            .unwrap_or(&[])
    }

    // -- Local actions --

    pub fn create_room(&mut self, settings: DuelSettings) -> Result<Vec<Effect>, SessionError> {
        self.ensure_idle()?;
        settings.validate().map_err(SessionError::Validation)?;

        self.pending.push(settings.create_room_command(&self.user_id));
        self.intent = Some(Intent::Host(settings));
        self.phase = SessionPhase::Connecting;
        tracing::info!(user = %self.user_id, "creating room");
        Ok(vec![Effect::OpenChannel])
    }

    pub fn join_room(&mut self, room_code: &str) -> Result<Vec<Effect>, SessionError> {
        self.ensure_idle()?;
        let room_code = room_code.trim();
        if room_code.is_empty() {
            return Err(SessionError::EmptyRoomCode);
        }

        self.pending.push(ClientCommand::JoinRoom {
            user_id: self.user_id.clone(),
            room_code: room_code.to_string(),
        });
        self.intent = Some(Intent::Guest(room_code.to_string()));
        self.phase = SessionPhase::Connecting;
        tracing::info!(user = %self.user_id, room = room_code, "joining room");
        Ok(vec![Effect::OpenChannel])
    }

    pub fn mark_ready(&mut self) -> Result<Vec<Effect>, SessionError> {
        match self.phase {
            SessionPhase::Closed => return Err(SessionError::RoomClosed),
            SessionPhase::WaitingForPeer | SessionPhase::BothReady | SessionPhase::InProgress => {}
            _ => return Err(SessionError::NotInRoom),
        }
        if self.local.ready {
            return Ok(Vec::new());
        }
        let (Some(role), Some(session)) = (self.local.role(), self.session.as_ref()) else {
            return Err(SessionError::NotInRoom);
        };

        self.local.ready = true;
        let room_code = session.room_code.clone();
        let user_id = self.user_id.clone();
        let cmd = match role {
            Role::Host => ClientCommand::HostReady { room_code, user_id },
            Role::Guest => ClientCommand::GuestReady { room_code, user_id },
        };
        let mut effects = vec![Effect::Send(cmd)];
        self.try_start(&mut effects);
        Ok(effects)
    }

    /// Apply a scored answer from the quiz flow. Only correct answers are
    /// relayed, always with the post-update cumulative score.
    pub fn record_answer(&mut self, feedback: &AnswerFeedback) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.local.score = feedback.total;
        self.local.streak = feedback.streak;
        if !feedback.correct {
            return effects;
        }
        if !matches!(self.phase, SessionPhase::InProgress | SessionPhase::Completed) {
            tracing::debug!(phase = ?self.phase, "not relaying score outside a running duel");
            return effects;
        }
        let now = self.clock.now_millis();
        if let Some(relay) = self.relay.as_mut() {
            let (cmd, change) = relay.record_local(feedback.total, now);
            effects.push(Effect::Send(cmd));
            if let Some(change) = change {
                effects.push(Effect::Notify(Notice::LeadChanged(change)));
            }
        }
        effects
    }

    pub fn on_countdown_elapsed(&mut self) -> Vec<Effect> {
        if self.phase != SessionPhase::InProgress {
            return Vec::new();
        }
        let now = self.clock.now_millis();
        match self.anchor {
            Some(anchor) if anchor.is_elapsed(now) => {
                tracing::info!("study countdown finished");
                self.phase = SessionPhase::Completed;
                vec![Effect::StopCountdown, Effect::Navigate(Destination::Quiz)]
            }
            _ => {
                tracing::debug!("stale countdown completion ignored");
                Vec::new()
            }
        }
    }

    /// Release the channel and timers. Safe to call more than once; only the
    /// first call (or a prior room closure) produces effects.
    pub fn teardown(&mut self) -> Vec<Effect> {
        if self.torn_down {
            return Vec::new();
        }
        self.torn_down = true;
        self.pending.clear();
        vec![Effect::StopCountdown, Effect::CloseChannel]
    }

    // -- Channel lifecycle --

    pub fn on_channel_open(&mut self) -> Vec<Effect> {
        if self.phase != SessionPhase::Connecting {
            tracing::debug!(phase = ?self.phase, "channel open outside of connect; nothing queued");
            return Vec::new();
        }
        self.phase = SessionPhase::AwaitingRoomConfirmation;
        self.pending.drain(..).map(Effect::Send).collect()
    }

    pub fn on_channel_closed(&mut self) -> Vec<Effect> {
        match self.phase {
            SessionPhase::Idle | SessionPhase::Closed => Vec::new(),
            SessionPhase::Connecting | SessionPhase::AwaitingRoomConfirmation => {
                tracing::warn!("channel lost before the room was confirmed");
                self.phase = SessionPhase::Idle;
                self.intent = None;
                self.pending.clear();
                vec![Effect::Notify(Notice::ChannelLost)]
            }
            _ => {
                tracing::warn!(phase = ?self.phase, "channel lost");
                vec![Effect::Notify(Notice::ChannelLost)]
            }
        }
    }

    // -- Inbound events --

    pub fn handle_event(&mut self, event: ServerEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.phase == SessionPhase::Closed {
            tracing::debug!(kind = event.kind(), "room closed; ignoring event");
            return effects;
        }

        match event {
            ServerEvent::RoomCreated { room_code } => self.on_room_created(room_code, &mut effects),

            ServerEvent::JoinSucc { room } => self.on_snapshot(&room, false, &mut effects),
            ServerEvent::AlrHost { room } => self.on_snapshot(&room, true, &mut effects),

            ServerEvent::OppJoined => {
                if self.in_room() && !self.peer.connected {
                    self.peer.connected = true;
                    effects.push(Effect::Notify(Notice::PeerJoined));
                }
            }

            ServerEvent::GuestReady => {
                if self.local.role() == Some(Role::Host) {
                    self.on_peer_ready(&mut effects);
                }
            }
            ServerEvent::HostReady => {
                if self.local.role() == Some(Role::Guest) {
                    self.on_peer_ready(&mut effects);
                }
            }
            ServerEvent::OpponentReady => self.on_peer_ready(&mut effects),

            ServerEvent::StartGame { end_time } => self.on_start_game(end_time, &mut effects),

            ServerEvent::ScoreUpdate { score } => {
                self.peer.score = score;
                let now = self.clock.now_millis();
                if let Some(change) = self.relay.as_mut().and_then(|r| r.record_peer(score, now)) {
                    effects.push(Effect::Notify(Notice::LeadChanged(change)));
                }
            }

            ServerEvent::Error { message } | ServerEvent::InternalError { message } => {
                tracing::warn!(phase = ?self.phase, "service error: {}", message);
                effects.push(Effect::Notify(Notice::ServiceError(message)));
            }
        }

        effects
    }

    // -- Internals --

    fn ensure_idle(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Idle => Ok(()),
            SessionPhase::Closed => Err(SessionError::RoomClosed),
            _ => Err(SessionError::AlreadyInRoom),
        }
    }

    fn in_room(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::WaitingForPeer
                | SessionPhase::BothReady
                | SessionPhase::InProgress
                | SessionPhase::Completed
        )
    }

    fn on_room_created(&mut self, room_code: String, effects: &mut Vec<Effect>) {
        let settings = match (&self.intent, self.phase) {
            (Some(Intent::Host(settings)), SessionPhase::AwaitingRoomConfirmation) => settings.clone(),
            _ => {
                tracing::warn!(phase = ?self.phase, "unexpected roomCreated ignored");
                return;
            }
        };

        let role = self.local.resolve_role(Role::Host);
        self.session = Some(Session::provisioned(room_code.clone(), &settings, &self.user_id));
        self.relay = Some(ScoreRelay::new(room_code.clone(), self.user_id.clone()));
        self.phase = SessionPhase::WaitingForPeer;
        tracing::info!(room = %room_code, ?role, "room created");

        effects.push(Effect::Notify(Notice::RoomCreated {
            room_code: room_code.clone(),
        }));
        // Ask for the full snapshot (questions, flags) as the host.
        effects.push(Effect::Send(ClientCommand::JoinRoom {
            user_id: self.user_id.clone(),
            room_code,
        }));
    }

    fn on_snapshot(&mut self, room: &RoomSnapshot, says_host: bool, effects: &mut Vec<Effect>) {
        if matches!(self.phase, SessionPhase::Idle | SessionPhase::Connecting) {
            tracing::warn!(phase = ?self.phase, "room snapshot without a pending request ignored");
            return;
        }

        let first = self.local.role().is_none();
        let derived = if says_host
            || matches!(self.intent, Some(Intent::Host(_)))
            || room.host_id == self.user_id
        {
            Role::Host
        } else {
            Role::Guest
        };
        let role = self.local.resolve_role(derived);
        if role != derived {
            tracing::debug!(?role, ?derived, "role already fixed; snapshot does not change it");
        }

        let locked = matches!(self.phase, SessionPhase::InProgress | SessionPhase::Completed);
        let session = self.session.get_or_insert_with(Session::default);
        session.apply_snapshot(room, locked);
        if session.room_code.is_empty() {
            if let Some(Intent::Guest(code)) = &self.intent {
                session.room_code = code.clone();
            }
        }
        let room_code = session.room_code.clone();
        if self.relay.is_none() {
            self.relay = Some(ScoreRelay::new(room_code, self.user_id.clone()));
        }

        if room.closed && !matches!(self.phase, SessionPhase::Completed) {
            self.close_room(effects);
            return;
        }

        if self.phase == SessionPhase::AwaitingRoomConfirmation {
            self.phase = SessionPhase::WaitingForPeer;
            tracing::info!(?role, "joined room");
        }
        if first {
            effects.push(Effect::Notify(Notice::RoomJoined { role }));
        }

        let (own_ready, peer_ready, peer_present) = match role {
            Role::Host => (room.host_ready, room.guest_ready, room.guest_id.is_some()),
            Role::Guest => (room.guest_ready, room.host_ready, true),
        };
        self.local.ready |= own_ready;
        if peer_present && !self.peer.connected {
            self.peer.connected = true;
        }
        if peer_ready {
            self.on_peer_ready(effects);
        } else {
            self.try_start(effects);
        }
    }

    fn on_peer_ready(&mut self, effects: &mut Vec<Effect>) {
        if !self.in_room() {
            tracing::debug!(phase = ?self.phase, "peer readiness before room confirmation ignored");
            return;
        }
        if !self.peer.ready {
            self.peer.ready = true;
            self.peer.connected = true;
            effects.push(Effect::Notify(Notice::PeerReady));
        }
        self.try_start(effects);
    }

    /// The both-ready transition. Runs at most once per session, whichever
    /// input establishes it first.
    fn try_start(&mut self, effects: &mut Vec<Effect>) {
        if self.phase != SessionPhase::WaitingForPeer || !(self.local.ready && self.peer.ready) {
            return;
        }
        self.phase = SessionPhase::BothReady;
        let minutes = self.session.as_ref().map(|s| s.study_time_minutes).unwrap_or(1);
        let anchor = CountdownAnchor::from_minutes(self.clock.now_millis(), minutes);
        self.begin(anchor, effects);
    }

    fn begin(&mut self, anchor: CountdownAnchor, effects: &mut Vec<Effect>) {
        self.anchor = Some(anchor);
        self.phase = SessionPhase::InProgress;
        tracing::info!(end_time = anchor.end_time_millis, "both ready; countdown anchored");
        effects.push(Effect::StartCountdown(anchor));
        effects.push(Effect::Notify(Notice::CountdownStarted(anchor)));
    }

    fn on_start_game(&mut self, end_time: Option<i64>, effects: &mut Vec<Effect>) {
        if self.start_confirmed {
            return;
        }
        let minutes = self.session.as_ref().map(|s| s.study_time_minutes).unwrap_or(1);
        let anchor = end_time
            .map(CountdownAnchor::at)
            .unwrap_or_else(|| CountdownAnchor::from_minutes(self.clock.now_millis(), minutes));

        match self.phase {
            SessionPhase::WaitingForPeer | SessionPhase::BothReady => {
                self.start_confirmed = true;
                self.local.ready = true;
                self.peer.ready = true;
                self.begin(anchor, effects);
            }
            SessionPhase::InProgress => {
                self.start_confirmed = true;
                if end_time.is_some() && self.anchor != Some(anchor) {
                    tracing::debug!(end_time = anchor.end_time_millis, "re-anchoring to start signal");
                    self.anchor = Some(anchor);
                    effects.push(Effect::StartCountdown(anchor));
                }
            }
            _ => tracing::debug!(phase = ?self.phase, "startGame ignored"),
        }
    }

    fn close_room(&mut self, effects: &mut Vec<Effect>) {
        tracing::info!(phase = ?self.phase, "room is closed; leaving");
        self.phase = SessionPhase::Closed;
        self.anchor = None;
        self.pending.clear();
        effects.push(Effect::StopCountdown);
        effects.push(Effect::Notify(Notice::RoomClosed));
        effects.push(Effect::Navigate(Destination::Leave));
        if !self.torn_down {
            self.torn_down = true;
            effects.push(Effect::CloseChannel);
        }
    }
}
