use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::channel::{ChannelEvent, Subscription};
use crate::countdown::CountdownEvent;

#[derive(Debug)]
pub enum AppEvent {
    Input(String),
    InputClosed,
    Channel(ChannelEvent),
    Countdown(CountdownEvent),
    FeedbackDone,
}

pub async fn event_loop(
    mut channel: Subscription,
    mut countdown_rx: mpsc::UnboundedReceiver<CountdownEvent>,
    event_tx: mpsc::Sender<AppEvent>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        let event = tokio::select! {
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) => AppEvent::Input(line),
                Ok(None) => {
                    input_open = false;
                    AppEvent::InputClosed
                }
                Err(e) => {
                    tracing::warn!("stdin read failed: {}", e);
                    input_open = false;
                    AppEvent::InputClosed
                }
            },
            Some(ev) = channel.recv() => AppEvent::Channel(ev),
            Some(ev) = countdown_rx.recv() => AppEvent::Countdown(ev),
            else => break,
        };

        if event_tx.send(event).await.is_err() {
            break;
        }
    }
}
