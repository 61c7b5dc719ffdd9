use crate::app::Screen;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // Global
    Quit,
    ShowHelp,
    ShowStatus,

    // Room
    Ready,

    // Quiz
    Answer(usize),
}

/// Map one line of user input for the current screen.
pub fn map_line(line: &str, screen: Screen, option_count: usize) -> Option<Action> {
    let line = line.trim();
    match line {
        "q" | "quit" | "exit" => return Some(Action::Quit),
        "?" | "help" => return Some(Action::ShowHelp),
        "s" | "status" => return Some(Action::ShowStatus),
        _ => {}
    }

    match screen {
        Screen::Connecting => None,

        Screen::Room => match line {
            "r" | "ready" => Some(Action::Ready),
            _ => None,
        },

        Screen::Quiz => match line.parse::<usize>() {
            Ok(n) if (1..=option_count).contains(&n) => Some(Action::Answer(n - 1)),
            _ => None,
        },

        Screen::Results => match line {
            "" => Some(Action::Quit),
            _ => None,
        },
    }
}

pub fn help(screen: Screen) -> &'static str {
    match screen {
        Screen::Connecting => "Waiting for the room service. q: quit",
        Screen::Room => "r: ready   s: status   q: leave",
        Screen::Quiz => "1-9: pick an answer   s: status   q: quit",
        Screen::Results => "Enter or q: quit",
    }
}
