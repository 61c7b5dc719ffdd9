use std::time::Duration;

use crate::countdown::CountdownAnchor;
use crate::protocol::Question;
use crate::scoring;

pub const QUESTION_TIME_LIMIT_SECS: u32 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub timed_out: bool,
    pub points_earned: u32,
    pub total: u32,
    pub streak: u32,
    pub level_up: bool,
    pub correct_option: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelOutcome {
    Won,
    Lost,
    Tied,
}

/// Quiz-taking flow over the session's question set.
#[derive(Debug, Clone)]
pub struct QuizRound {
    questions: Vec<Question>,
    index: usize,
    score: u32,
    streak: u32,
    deadline: Option<CountdownAnchor>,
    answered: bool,
}

impl QuizRound {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            index: 0,
            score: 0,
            streak: 0,
            deadline: None,
            answered: false,
        }
    }

    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.index)
    }

    /// 1-based position and total, for display.
    pub fn progress(&self) -> (usize, usize) {
        ((self.index + 1).min(self.questions.len()), self.questions.len())
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.questions.len()
    }

    /// Anchor the per-question timer for the current question.
    pub fn begin_question(&mut self, now_millis: i64) -> Option<CountdownAnchor> {
        if self.is_finished() {
            return None;
        }
        let anchor = CountdownAnchor::starting_at(
            now_millis,
            Duration::from_secs(u64::from(QUESTION_TIME_LIMIT_SECS)),
        );
        self.deadline = Some(anchor);
        self.answered = false;
        Some(anchor)
    }

    pub fn time_remaining(&self, now_millis: i64) -> u32 {
        self.deadline
            .map(|d| d.remaining_seconds(now_millis) as u32)
            .unwrap_or(0)
    }

    /// Answer by zero-based option index.
    pub fn answer_index(&mut self, index: usize, now_millis: i64) -> Option<AnswerFeedback> {
        let choice = self.current()?.options.get(index)?.clone();
        self.answer(Some(&choice), now_millis)
    }

    /// Submit an answer; `None` means the question timed out. Returns `None`
    /// when the current question was already answered or the quiz is over.
    pub fn answer(&mut self, choice: Option<&str>, now_millis: i64) -> Option<AnswerFeedback> {
        if self.answered {
            return None;
        }
        let question = self.questions.get(self.index)?;
        let remaining = self.time_remaining(now_millis);
        let timed_out = choice.is_none() || remaining == 0;
        let correct = !timed_out && choice.map(|c| question.is_correct(c)).unwrap_or(false);

        let outcome = scoring::score_answer(remaining, QUESTION_TIME_LIMIT_SECS, self.streak, correct);
        self.score = self.score.saturating_add(outcome.points_earned);
        self.streak = outcome.new_streak;
        self.answered = true;

        Some(AnswerFeedback {
            correct,
            timed_out,
            points_earned: outcome.points_earned,
            total: self.score,
            streak: self.streak,
            level_up: outcome.level_up,
            correct_option: question.correct_option.clone(),
        })
    }

    /// Move past an answered question.
    pub fn advance(&mut self) {
        if self.answered && !self.is_finished() {
            self.index += 1;
            self.answered = false;
            self.deadline = None;
        }
    }

    pub fn outcome(&self, peer_score: u32) -> DuelOutcome {
        match self.score.cmp(&peer_score) {
            std::cmp::Ordering::Greater => DuelOutcome::Won,
            std::cmp::Ordering::Less => DuelOutcome::Lost,
            std::cmp::Ordering::Equal => DuelOutcome::Tied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions() -> Vec<Question> {
        vec![
            Question {
                text: "What is the capital of France?".into(),
                options: vec!["Berlin".into(), "Paris".into(), "Rome".into(), "Madrid".into()],
                correct_option: "Paris".into(),
            },
            Question {
                text: "What is 2 + 2?".into(),
                options: vec!["3".into(), "4".into(), "5".into(), "22".into()],
                correct_option: "4".into(),
            },
        ]
    }

    #[test]
    fn test_correct_answer_with_full_time() {
        let mut quiz = QuizRound::new(questions());
        quiz.begin_question(0);
        let fb = quiz.answer(Some("Paris"), 0).unwrap();
        assert!(fb.correct);
        assert!(!fb.timed_out);
        assert_eq!(fb.points_earned, 1210);
        assert_eq!(fb.total, 1210);
        assert_eq!(fb.streak, 1);
    }

    #[test]
    fn test_second_answer_is_ignored() {
        let mut quiz = QuizRound::new(questions());
        quiz.begin_question(0);
        assert!(quiz.answer(Some("Berlin"), 1_000).is_some());
        assert!(quiz.answer(Some("Paris"), 1_000).is_none());
        assert_eq!(quiz.score(), 0);
    }

    #[test]
    fn test_timeout_resets_streak() {
        let mut quiz = QuizRound::new(questions());
        quiz.begin_question(0);
        quiz.answer_index(1, 5_000).unwrap();
        assert_eq!(quiz.streak(), 1);
        quiz.advance();

        quiz.begin_question(10_000);
        let fb = quiz.answer(None, 25_000).unwrap();
        assert!(fb.timed_out);
        assert!(!fb.correct);
        assert_eq!(fb.points_earned, 0);
        assert_eq!(quiz.streak(), 0);
        assert_eq!(fb.correct_option, "4");
    }

    #[test]
    fn test_late_click_counts_as_timeout() {
        let mut quiz = QuizRound::new(questions());
        quiz.begin_question(0);
        let fb = quiz.answer(Some("Paris"), 15_000).unwrap();
        assert!(fb.timed_out);
        assert_eq!(fb.points_earned, 0);
    }

    #[test]
    fn test_runs_to_completion() {
        let mut quiz = QuizRound::new(questions());
        assert_eq!(quiz.progress(), (1, 2));
        for _ in 0..2 {
            quiz.begin_question(0);
            quiz.answer(Some("4"), 0);
            quiz.advance();
        }
        assert!(quiz.is_finished());
        assert!(quiz.current().is_none());
        assert!(quiz.begin_question(0).is_none());
        assert_eq!(quiz.outcome(quiz.score()), DuelOutcome::Tied);
        assert_eq!(quiz.outcome(quiz.score() + 1), DuelOutcome::Lost);
    }

    #[test]
    fn test_advance_requires_answer() {
        let mut quiz = QuizRound::new(questions());
        quiz.begin_question(0);
        quiz.advance();
        assert_eq!(quiz.progress(), (1, 2));
    }

    #[test]
    fn test_empty_quiz_is_finished() {
        let quiz = QuizRound::new(Vec::new());
        assert!(quiz.is_finished());
        assert_eq!(quiz.outcome(0), DuelOutcome::Tied);
    }
}
