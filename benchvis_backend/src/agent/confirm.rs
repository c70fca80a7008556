//! Yes/no sub-dialogue used before destructive actions.

use std::time::Duration;

use async_trait::async_trait;

pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_GAP: Duration = Duration::from_millis(500);

const TYPED_YES: &[&str] = &["sim", "s", "yes", "y"];
const TYPED_NO: &[&str] = &["não", "nao", "n", "no"];
const SPOKEN_YES: &[&str] = &["sim", "pode"];
const SPOKEN_NO: &[&str] = &["não", "nao"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Cancelled,
}

/// Where a reply comes from and how it should be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heard {
    Typed(String),
    Spoken(String),
    /// Nothing this poll; keep waiting
    Silence,
    /// The source is gone; stop waiting
    Closed,
}

/// A source of short replies polled by [`await_confirmation`].
#[async_trait]
pub trait ReplySource: Send {
    /// Presents the question before polling starts.
    async fn announce(&mut self, _question: &str) {}

    async fn next_reply(&mut self) -> Heard;
}

/// Reads one reply. Unrecognised replies yield `None`.
pub fn interpret(heard: &Heard) -> Option<Confirmation> {
    match heard {
        Heard::Typed(text) => {
            let token = text.trim().to_lowercase();
            if TYPED_YES.contains(&token.as_str()) {
                Some(Confirmation::Confirmed)
            } else if TYPED_NO.contains(&token.as_str()) {
                Some(Confirmation::Cancelled)
            } else {
                None
            }
        }
        Heard::Spoken(text) => {
            let text = text.to_lowercase();
            if SPOKEN_YES.iter().any(|word| text.contains(word)) {
                Some(Confirmation::Confirmed)
            } else if SPOKEN_NO.iter().any(|word| text.contains(word)) {
                Some(Confirmation::Cancelled)
            } else {
                None
            }
        }
        Heard::Silence | Heard::Closed => None,
    }
}

/// Polls `source` until a recognised answer arrives or `timeout` elapses.
/// Timeouts and closed sources resolve to [`Confirmation::Cancelled`].
pub async fn await_confirmation(
    source: &mut dyn ReplySource,
    timeout: Duration,
) -> Confirmation {
    let poll = async {
        loop {
            let heard = source.next_reply().await;
            if heard == Heard::Closed {
                return Confirmation::Cancelled;
            }
            if let Some(answer) = interpret(&heard) {
                return answer;
            }
            if heard == Heard::Silence {
                tokio::time::sleep(POLL_GAP).await;
            } else {
                tracing::debug!("Ignoring reply during confirmation: {:?}", heard);
            }
        }
    };

    match tokio::time::timeout(timeout, poll).await {
        Ok(answer) => answer,
        Err(_) => {
            tracing::info!("Confirmation timed out after {:?}", timeout);
            Confirmation::Cancelled
        }
    }
}
