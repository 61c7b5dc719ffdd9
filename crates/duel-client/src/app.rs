use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use duel_common::countdown::{Clock, SystemClock};
use duel_common::protocol::{decode_event, ServerEvent};
use duel_common::quiz::QuizRound;
use duel_common::session::{
    Destination, Effect, Notice, RoomSessionController, SessionError, SessionPhase,
};
use duel_common::setup::DuelSettings;

use crate::channel::{ChannelEvent, ChannelManager};
use crate::countdown::{CountdownEvent, CountdownSynchronizer, Timer};
use crate::event::{self, AppEvent};
use crate::input::{self, Action};
use crate::view;

/// How long answer feedback stays up before the next question.
pub const FEEDBACK_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Connecting,
    Room,
    Quiz,
    Results,
}

#[derive(Debug, Clone)]
pub enum Mode {
    Host(DuelSettings),
    Join(String),
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub server: String,
    pub user_id: String,
    pub link_base: String,
    pub mode: Mode,
}

struct App {
    controller: RoomSessionController,
    channel: ChannelManager,
    study: CountdownSynchronizer,
    question_timer: CountdownSynchronizer,
    countdown_tx: mpsc::UnboundedSender<CountdownEvent>,
    event_tx: mpsc::Sender<AppEvent>,
    clock: Arc<dyn Clock>,
    quiz: Option<QuizRound>,
    screen: Screen,
    link_base: String,
    running: bool,
}

pub async fn run(options: ClientOptions) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let channel = ChannelManager::new(options.server.clone());
    let subscription = channel.subscribe();
    let (countdown_tx, countdown_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(64);

    let mut app = App {
        controller: RoomSessionController::new(options.user_id.clone(), clock.clone()),
        channel,
        study: CountdownSynchronizer::new(Timer::Study, clock.clone()),
        question_timer: CountdownSynchronizer::new(Timer::Question, clock.clone()),
        countdown_tx,
        event_tx: event_tx.clone(),
        clock,
        quiz: None,
        screen: Screen::Connecting,
        link_base: options.link_base.clone(),
        running: true,
    };

    let started = match &options.mode {
        Mode::Host(settings) => app.controller.create_room(settings.clone()),
        Mode::Join(code) => app.controller.join_room(code),
    };
    let effects = match started {
        Ok(effects) => effects,
        Err(SessionError::Validation(errors)) => {
            println!("Cannot create the duel:");
            view::validation_errors(&errors);
            anyhow::bail!("invalid duel settings");
        }
        Err(e) => return Err(e.into()),
    };

    let events = tokio::spawn(event::event_loop(subscription, countdown_rx, event_tx));
    app.apply(effects);

    while app.running {
        let event = match event_rx.recv().await {
            Some(e) => e,
            None => break,
        };
        app.handle(event);
    }

    app.shutdown();
    events.abort();
    Ok(())
}

impl App {
    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenChannel => self.channel.open(),
                Effect::Send(cmd) => {
                    self.channel.send(&cmd);
                }
                Effect::StartCountdown(anchor) => self.study.start(anchor, self.countdown_tx.clone()),
                Effect::StopCountdown => self.study.stop(),
                Effect::CloseChannel => self.channel.close(),
                Effect::Navigate(Destination::Quiz) => self.start_quiz(),
                Effect::Navigate(Destination::Leave) => self.running = false,
                Effect::Notify(notice) => {
                    if matches!(notice, Notice::RoomCreated { .. } | Notice::RoomJoined { .. }) {
                        self.screen = Screen::Room;
                    }
                    view::notice(&notice, &self.link_base, self.clock.now_millis());
                }
            }
        }
    }

    fn handle(&mut self, event: AppEvent) {
        match event {
            AppEvent::Channel(ChannelEvent::Opened) => {
                let effects = self.controller.on_channel_open();
                self.apply(effects);
            }
            AppEvent::Channel(ChannelEvent::Frame(text)) => match decode_event(&text) {
                Ok(ev) => {
                    let peer_scored = matches!(ev, ServerEvent::ScoreUpdate { .. });
                    let effects = self.controller.handle_event(ev);
                    self.apply(effects);
                    if peer_scored && matches!(self.screen, Screen::Quiz | Screen::Results) {
                        view::peer_score(
                            self.controller.peer().score,
                            self.controller.lead_change_active(),
                        );
                    }
                }
                Err(e) => tracing::warn!("dropping inbound frame: {}", e),
            },
            AppEvent::Channel(ChannelEvent::Closed) => {
                let effects = self.controller.on_channel_closed();
                self.apply(effects);
                // Nothing reconnects, so only a running quiz outlives the channel.
                if self.controller.phase() == SessionPhase::Idle
                    || matches!(self.screen, Screen::Connecting | Screen::Room)
                {
                    self.running = false;
                }
            }

            AppEvent::Countdown(CountdownEvent::Tick {
                timer: Timer::Study,
                anchor,
                remaining,
            }) => {
                if !self.study.owns(anchor) {
                    tracing::trace!(remaining, "stale study tick dropped");
                } else if let Some(urgency) = self.study.urgency() {
                    if self.controller.phase() == SessionPhase::InProgress {
                        view::study_tick(remaining, urgency);
                    }
                }
            }
            AppEvent::Countdown(CountdownEvent::Elapsed {
                timer: Timer::Study,
                anchor,
            }) => {
                if self.study.owns(anchor) {
                    let effects = self.controller.on_countdown_elapsed();
                    self.apply(effects);
                }
            }
            AppEvent::Countdown(CountdownEvent::Tick {
                timer: Timer::Question,
                anchor,
                remaining,
            }) => {
                if self.screen == Screen::Quiz && self.question_timer.owns(anchor) {
                    view::question_tick(remaining);
                }
            }
            AppEvent::Countdown(CountdownEvent::Elapsed {
                timer: Timer::Question,
                anchor,
            }) => {
                let now = self.clock.now_millis();
                // A stale expiry from the previous question must not time out this one.
                let expired = self.question_timer.owns(anchor)
                    && self.quiz.as_ref().map(|q| q.time_remaining(now) == 0).unwrap_or(false);
                if expired {
                    self.answer(None);
                }
            }

            AppEvent::Input(line) => self.on_input(&line),
            AppEvent::InputClosed => {
                tracing::info!("input closed; leaving");
                self.running = false;
            }
            AppEvent::FeedbackDone => {
                if let Some(quiz) = self.quiz.as_mut() {
                    quiz.advance();
                }
                self.show_question();
            }
        }
    }

    fn on_input(&mut self, line: &str) {
        let option_count = self
            .quiz
            .as_ref()
            .and_then(|q| q.current())
            .map(|q| q.options.len())
            .unwrap_or(0);

        match input::map_line(line, self.screen, option_count) {
            Some(Action::Quit) => self.running = false,
            Some(Action::ShowHelp) => println!("{}", input::help(self.screen)),
            Some(Action::ShowStatus) => view::status(&self.controller),
            Some(Action::Ready) => match self.controller.mark_ready() {
                Ok(effects) => {
                    if !effects.is_empty() {
                        println!("You: Ready");
                    }
                    self.apply(effects);
                }
                Err(e) => println!("{}", e),
            },
            Some(Action::Answer(index)) => self.answer(Some(index)),
            None => {
                if !line.trim().is_empty() {
                    println!("Unknown command. Type `help`.");
                }
            }
        }
    }

    fn start_quiz(&mut self) {
        self.screen = Screen::Quiz;
        let questions = self.controller.questions().to_vec();
        if questions.is_empty() {
            tracing::warn!("room has no generated questions");
            println!("No questions were generated for this room.");
        }
        println!("Study time is over. Quiz time!");
        self.quiz = Some(QuizRound::new(questions));
        self.show_question();
    }

    fn show_question(&mut self) {
        let now = self.clock.now_millis();
        let Some(quiz) = self.quiz.as_mut() else {
            return;
        };

        match quiz.begin_question(now) {
            Some(anchor) => {
                self.question_timer.start(anchor, self.countdown_tx.clone());
                if let Some(q) = quiz.current() {
                    let line = view::score_line(
                        quiz.score(),
                        quiz.streak(),
                        self.controller.peer().score,
                        self.controller.lead_change_active(),
                    );
                    view::question(q, quiz.progress(), &line);
                }
            }
            None => {
                self.screen = Screen::Results;
                let peer = self.controller.peer().score;
                view::results(quiz.score(), peer, quiz.outcome(peer));
                println!("{}", input::help(self.screen));
            }
        }
    }

    fn answer(&mut self, choice: Option<usize>) {
        let now = self.clock.now_millis();
        let Some(quiz) = self.quiz.as_mut() else {
            return;
        };
        let feedback = match choice {
            Some(index) => quiz.answer_index(index, now),
            None => quiz.answer(None, now),
        };
        let Some(feedback) = feedback else {
            return;
        };

        self.question_timer.stop();
        view::feedback(&feedback);
        let effects = self.controller.record_answer(&feedback);
        self.apply(effects);

        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(FEEDBACK_DELAY).await;
            let _ = tx.send(AppEvent::FeedbackDone).await;
        });
    }

    /// Runs on every exit path. The controller hands out the close effect
    /// only once, so a room that already closed is not closed twice.
    fn shutdown(&mut self) {
        let effects = self.controller.teardown();
        self.apply(effects);
        self.question_timer.stop();
    }
}
