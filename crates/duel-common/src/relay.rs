use crate::protocol::ClientCommand;

/// How long a lead-change hint stays visible.
pub const LEAD_CHANGE_HINT_MILLIS: i64 = 1_500;

/// A flip of `local >= peer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadChange {
    pub leading: bool,
}

/// Relays local score to the peer and tracks who is ahead.
#[derive(Debug, Clone)]
pub struct ScoreRelay {
    room_code: String,
    user_id: String,
    local_score: u32,
    peer_score: u32,
    lead_changed_at: Option<i64>,
}

impl ScoreRelay {
    pub fn new(room_code: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            room_code: room_code.into(),
            user_id: user_id.into(),
            local_score: 0,
            peer_score: 0,
            lead_changed_at: None,
        }
    }

    pub fn local_score(&self) -> u32 {
        self.local_score
    }

    pub fn peer_score(&self) -> u32 {
        self.peer_score
    }

    pub fn is_leading(&self) -> bool {
        self.local_score >= self.peer_score
    }

    /// Record the post-update cumulative local score and build the command
    /// announcing it.
    pub fn record_local(&mut self, cumulative: u32, now_millis: i64) -> (ClientCommand, Option<LeadChange>) {
        let before = self.is_leading();
        self.local_score = cumulative;
        let change = self.detect_change(before, now_millis);
        let cmd = ClientCommand::Score {
            room_code: self.room_code.clone(),
            user_id: self.user_id.clone(),
            score: self.local_score,
        };
        (cmd, change)
    }

    pub fn record_peer(&mut self, score: u32, now_millis: i64) -> Option<LeadChange> {
        let before = self.is_leading();
        self.peer_score = score;
        self.detect_change(before, now_millis)
    }

    /// True while the most recent lead change is younger than the hint window.
    pub fn lead_change_active(&self, now_millis: i64) -> bool {
        self.lead_changed_at
            .map(|at| now_millis.saturating_sub(at) < LEAD_CHANGE_HINT_MILLIS)
            .unwrap_or(false)
    }

    fn detect_change(&mut self, before: bool, now_millis: i64) -> Option<LeadChange> {
        let after = self.is_leading();
        if before == after {
            return None;
        }
        tracing::debug!(leading = after, local = self.local_score, peer = self.peer_score, "lead changed");
        self.lead_changed_at = Some(now_millis);
        Some(LeadChange { leading: after })
    }
}
