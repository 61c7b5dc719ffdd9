//! Plain-text presenter. Everything user-facing goes through here.

use duel_common::countdown::{format_clock, Urgency};
use duel_common::protocol::Question;
use duel_common::quiz::{AnswerFeedback, DuelOutcome};
use duel_common::session::{Notice, RoomSessionController, Role, SessionPhase};
use duel_common::setup::{duel_link, ValidationError};

pub fn notice(notice: &Notice, link_base: &str, now_millis: i64) {
    match notice {
        Notice::RoomCreated { room_code } => {
            println!("Room created: {}", room_code);
            println!("Share this link with your friend: {}", duel_link(link_base, room_code));
        }
        Notice::RoomJoined { role } => match role {
            Role::Host => println!("You are hosting this duel. Type `ready` when you are."),
            Role::Guest => println!("Joined the duel. Type `ready` when you are."),
        },
        Notice::PeerJoined => println!("Your opponent connected."),
        Notice::PeerReady => println!("Opponent: Ready"),
        Notice::CountdownStarted(anchor) => {
            println!(
                "Both ready! Study time left: {}",
                format_clock(anchor.remaining_seconds(now_millis))
            );
        }
        Notice::LeadChanged(change) => {
            if change.leading {
                println!(">> You took the lead!");
            } else {
                println!(">> Your opponent took the lead!");
            }
        }
        Notice::ServiceError(message) => println!("Error: {}", message),
        Notice::RoomClosed => println!("This room is closed. Leaving."),
        Notice::ChannelLost => println!("Connection to the room service was lost."),
    }
}

pub fn validation_errors(errors: &[ValidationError]) {
    for e in errors {
        println!("  - {}", e);
    }
}

/// Study countdown line. Prints every minute, every ten seconds in the
/// last minute and every second at the end.
pub fn study_tick(remaining: u64, urgency: Urgency) {
    let show = match urgency {
        Urgency::Relaxed => remaining % 60 == 0,
        Urgency::Hurry => remaining % 10 == 0,
        Urgency::Critical => true,
    };
    if show {
        println!("Study time left: {}", format_clock(remaining));
    }
}

pub fn question_tick(remaining: u64) {
    if remaining > 0 && remaining <= 5 {
        println!("  {}s", remaining);
    }
}

/// Running score header. `lead_flash` marks a lead change in the last moments.
pub fn score_line(score: u32, streak: u32, peer_score: u32, lead_flash: bool) -> String {
    let mut line = format!(
        "Score: {}  |  Streak: {}  |  Opponent: {}",
        score, streak, peer_score
    );
    if lead_flash {
        line.push_str(lead_marker(score >= peer_score));
    }
    line
}

fn lead_marker(leading: bool) -> &'static str {
    if leading {
        "  << you lead"
    } else {
        "  << opponent leads"
    }
}

pub fn question(q: &Question, (position, total): (usize, usize), score_line: &str) {
    println!();
    println!("Question {}/{}  |  {}", position, total, score_line);
    println!("{}", q.text);
    for (i, option) in q.options.iter().enumerate() {
        println!("  {}) {}", i + 1, option);
    }
}

pub fn feedback(fb: &AnswerFeedback) {
    if fb.correct {
        println!("Correct! +{}", fb.points_earned);
    } else if fb.timed_out {
        println!("Time's up! The answer was {}.", fb.correct_option);
    } else {
        println!("Oops! The answer was {}. Try the next one.", fb.correct_option);
    }
    if fb.level_up {
        println!("Level up! {} in a row.", fb.streak);
    }
}

pub fn peer_score(score: u32, lead_flash: bool) {
    if lead_flash {
        println!("Opponent score: {}  (lead changed)", score);
    } else {
        println!("Opponent score: {}", score);
    }
}

pub fn results(score: u32, peer_score: u32, outcome: DuelOutcome) {
    println!();
    println!("Quiz Complete!");
    println!("Final Score: {}", score);
    println!("Opponent:    {}", peer_score);
    match outcome {
        DuelOutcome::Won => println!("You won the duel!"),
        DuelOutcome::Lost => println!("Your opponent won this time."),
        DuelOutcome::Tied => println!("It's a tie!"),
    }
}

pub fn status(ctl: &RoomSessionController) {
    let phase = match ctl.phase() {
        SessionPhase::Idle => "idle",
        SessionPhase::Connecting => "connecting",
        SessionPhase::AwaitingRoomConfirmation => "waiting for the room",
        SessionPhase::WaitingForPeer => "waiting for both players",
        SessionPhase::BothReady | SessionPhase::InProgress => "studying",
        SessionPhase::Completed => "quiz",
        SessionPhase::Closed => "closed",
    };
    println!("Status: {}", phase);
    if let Some(session) = ctl.session() {
        println!("Study Duel: {} ({} minutes)", session.topic, session.study_time_minutes);
    }
    let you = if ctl.local().ready { "Ready" } else { "Not Ready" };
    let opponent = match (ctl.peer().connected, ctl.peer().ready) {
        (_, true) => "Ready",
        (true, false) => "Not Ready",
        (false, false) => "Waiting...",
    };
    println!("You: {}  |  Opponent: {}", you, opponent);
    if let Some(remaining) = ctl.remaining_seconds() {
        if ctl.phase() == SessionPhase::InProgress {
            println!("Study time left: {}", format_clock(remaining));
        }
    }
    if ctl.phase() == SessionPhase::Completed {
        let lead = if ctl.local().score >= ctl.peer().score { "leading" } else { "behind" };
        println!("Score: {} vs {} ({})", ctl.local().score, ctl.peer().score, lead);
        if ctl.lead_change_active() {
            println!("The lead just changed hands!");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_line_without_hint() {
        assert_eq!(
            score_line(2310, 2, 1100, false),
            "Score: 2310  |  Streak: 2  |  Opponent: 1100"
        );
    }

    #[test]
    fn test_score_line_marks_recent_lead_change() {
        assert!(score_line(2310, 2, 1100, true).ends_with("<< you lead"));
        assert!(score_line(0, 0, 1100, true).ends_with("<< opponent leads"));
    }
}
