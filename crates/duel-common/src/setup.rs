use crate::protocol::ClientCommand;

pub const MIN_SCOPE_CHARS: usize = 20;
pub const DEFAULT_STUDY_MINUTES: u32 = 15;
pub const DEFAULT_QUESTION_COUNT: u32 = 10;

/// Host-side duel setup form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelSettings {
    pub topic: String,
    pub scope: String,
    pub study_time_minutes: u32,
    pub question_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a topic.")]
    EmptyTopic,
    #[error("Please describe the scope in at least {} characters.", MIN_SCOPE_CHARS)]
    ScopeTooShort,
    #[error("Please enter a valid number of questions.")]
    NoQuestions,
    #[error("Study time must be at least one minute.")]
    NoStudyTime,
}

impl DuelSettings {
    pub fn new(topic: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            scope: scope.into(),
            study_time_minutes: DEFAULT_STUDY_MINUTES,
            question_count: DEFAULT_QUESTION_COUNT,
        }
    }

    /// All failing fields, in form order.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.topic.trim().is_empty() {
            errors.push(ValidationError::EmptyTopic);
        }
        if self.scope.trim().chars().count() < MIN_SCOPE_CHARS {
            errors.push(ValidationError::ScopeTooShort);
        }
        if self.question_count < 1 {
            errors.push(ValidationError::NoQuestions);
        }
        if self.study_time_minutes < 1 {
            errors.push(ValidationError::NoStudyTime);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn create_room_command(&self, host_id: &str) -> ClientCommand {
        ClientCommand::CreateRoom {
            topic: self.topic.trim().to_string(),
            scope: self.scope.trim().to_string(),
            study_time: self.study_time_minutes,
            questions: self.question_count,
            host_id: host_id.to_string(),
        }
    }
}

/// Link the host shares with the guest.
pub fn duel_link(base: &str, room_code: &str) -> String {
    format!("{}/study?code={}", base.trim_end_matches('/'), room_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> DuelSettings {
        DuelSettings::new("Photosynthesis", "Light and dark reactions, chapter 8")
    }

    #[test]
    fn test_valid_settings() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let settings = DuelSettings {
            topic: "   ".into(),
            scope: "short".into(),
            study_time_minutes: 0,
            question_count: 0,
        };
        assert_eq!(
            settings.validate().unwrap_err(),
            vec![
                ValidationError::EmptyTopic,
                ValidationError::ScopeTooShort,
                ValidationError::NoQuestions,
                ValidationError::NoStudyTime,
            ]
        );
    }

    #[test]
    fn test_scope_counts_characters_not_bytes() {
        let mut settings = valid();
        settings.scope = "é".repeat(MIN_SCOPE_CHARS);
        assert!(settings.validate().is_ok());
        settings.scope = "é".repeat(MIN_SCOPE_CHARS - 1);
        assert_eq!(
            settings.validate().unwrap_err(),
            vec![ValidationError::ScopeTooShort]
        );
    }

    #[test]
    fn test_create_room_command() {
        let mut settings = valid();
        settings.topic = "  Photosynthesis ".into();
        match settings.create_room_command("host-7") {
            ClientCommand::CreateRoom {
                topic,
                study_time,
                questions,
                host_id,
                ..
            } => {
                assert_eq!(topic, "Photosynthesis");
                assert_eq!(study_time, DEFAULT_STUDY_MINUTES);
                assert_eq!(questions, DEFAULT_QUESTION_COUNT);
                assert_eq!(host_id, "host-7");
            }
            other => panic!("wrong command: {:?}", other),
        }
    }

    #[test]
    fn test_duel_link() {
        assert_eq!(
            duel_link("https://duel.example/", "XK92"),
            "https://duel.example/study?code=XK92"
        );
    }
}
