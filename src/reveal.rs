//! Replays the reasoning trace on a fixed timeline.
//!
//! Fragments arrive whenever the model emits them. At four fixed offsets from
//! audit start the scheduler samples whatever has arrived so far and reveals
//! the first sentence of one fragment, so the visible log does not depend on
//! network timing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::audit::types::ThoughtEntry;

/// Offsets from audit start, with the label shown for each.
pub const REVEAL_SCHEDULE: [(Duration, &str); 4] = [
    (Duration::from_secs(2), "0:02"),
    (Duration::from_secs(5), "0:05"),
    (Duration::from_secs(9), "0:09"),
    (Duration::from_secs(14), "0:14"),
];

pub const MAX_REVEALED: usize = 4;
const MAX_ENTRY_CHARS: usize = 100;

pub type SessionId = u64;

/// Receives each revealed entry, tagged with its session.
pub type RevealSink = Arc<dyn Fn(SessionId, ThoughtEntry) + Send + Sync>;

/// Append-only reasoning fragments of one session.
#[derive(Clone, Default)]
pub struct FragmentBuffer {
    fragments: Arc<Mutex<Vec<String>>>,
}

impl FragmentBuffer {
    pub fn push(&self, fragment: &str) {
        self.fragments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fragment.to_string());
    }

    pub fn len(&self) -> usize {
        self.fragments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The fragment at `index`, clamped to the last one available.
    pub fn sample(&self, index: usize) -> Option<String> {
        let fragments = self.fragments.lock().unwrap_or_else(PoisonError::into_inner);
        let last = fragments.len().checked_sub(1)?;
        fragments.get(index.min(last)).cloned()
    }
}

/// First sentence of a fragment, stripped of markdown emphasis and collapsed
/// to single spaces, capped at 100 characters.
pub fn first_sentence(text: &str) -> String {
    let cleaned = text
        .replace(['*', '#', '`'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let sentence = match cleaned.find(['.', '!', '?']) {
        Some(end) => &cleaned[..=end],
        None => cleaned.as_str(),
    };

    if sentence.chars().count() <= MAX_ENTRY_CHARS {
        sentence.to_string()
    } else {
        let mut truncated: String = sentence.chars().take(MAX_ENTRY_CHARS - 3).collect();
        truncated.push_str("...");
        truncated
    }
}

/// Owns the reveal timers of every scheduled session.
#[derive(Default)]
pub struct RevealScheduler {
    timers: Mutex<HashMap<SessionId, Vec<JoinHandle<()>>>>,
}

impl RevealScheduler {
    /// Commit to the four reveal offsets for `session`, measured from now.
    pub fn schedule(&self, session: SessionId, buffer: FragmentBuffer, sink: RevealSink) {
        let start = Instant::now();
        let revealed = Arc::new(Mutex::new(0usize));

        let handles = REVEAL_SCHEDULE
            .iter()
            .enumerate()
            .map(|(index, &(offset, label))| {
                let buffer = buffer.clone();
                let sink = sink.clone();
                let revealed = revealed.clone();

                tokio::spawn(async move {
                    tokio::time::sleep_until(start + offset).await;

                    let Some(fragment) = buffer.sample(index) else {
                        debug!(session, label, "No reasoning yet, nothing to reveal");
                        return;
                    };
                    let text = first_sentence(&fragment);
                    if text.is_empty() {
                        debug!(session, label, "Sampled fragment has no text, skipping");
                        return;
                    }
                    {
                        let mut count = revealed.lock().unwrap_or_else(PoisonError::into_inner);
                        if *count >= MAX_REVEALED {
                            return;
                        }
                        *count += 1;
                    }

                    let entry = ThoughtEntry {
                        text,
                        timestamp_label: label,
                    };
                    debug!(session, label, available = buffer.len(), "Revealing thought");
                    sink(session, entry);
                })
            })
            .collect();

        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session, handles);
    }

    /// Abort every pending reveal of `session`.
    pub fn cancel(&self, session: SessionId) {
        let handles = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session);
        if let Some(handles) = handles {
            handles.iter().for_each(JoinHandle::abort);
            debug!(session, "Reveal timers cancelled");
        }
    }

    pub fn cancel_all(&self) {
        let sessions: Vec<SessionId> = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        for session in sessions {
            self.cancel(session);
        }
    }
}

impl Drop for RevealScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    fn channel_sink() -> (RevealSink, mpsc::UnboundedReceiver<ThoughtEntry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: RevealSink = Arc::new(move |_session: SessionId, entry: ThoughtEntry| {
            let _ = tx.send(entry);
        });
        (sink, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ThoughtEntry>) -> Vec<ThoughtEntry> {
        let mut entries = Vec::new();
        while let Ok(entry) = rx.try_recv() {
            entries.push(entry);
        }
        entries
    }

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("Rates rose. Then fell."), "Rates rose.");
        assert_eq!(first_sentence("Is it true? Maybe."), "Is it true?");
        assert_eq!(
            first_sentence("**Assessing the evidence**\n\nI am weighing   sources! Next"),
            "Assessing the evidence I am weighing sources!"
        );
        assert_eq!(first_sentence("no punctuation here"), "no punctuation here");
    }

    #[test]
    fn test_first_sentence_truncates_long_text() {
        let long = "a".repeat(150);
        let sentence = first_sentence(&long);
        assert_eq!(sentence.chars().count(), 100);
        assert_eq!(sentence, format!("{}...", "a".repeat(97)));
    }

    #[test]
    fn test_buffer_sample_clamps() {
        let buffer = FragmentBuffer::default();
        assert_eq!(buffer.sample(0), None);
        buffer.push("one");
        buffer.push("two");
        assert_eq!(buffer.sample(0).as_deref(), Some("one"));
        assert_eq!(buffer.sample(3).as_deref(), Some("two"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_samples_clamped_fragments() {
        let scheduler = RevealScheduler::default();
        let buffer = FragmentBuffer::default();
        let (sink, mut rx) = channel_sink();
        scheduler.schedule(1, buffer.clone(), sink);

        let feeder = buffer.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(500)).await;
            feeder.push("First fragment. With more text");
            sleep(Duration::from_millis(2500)).await;
            feeder.push("Second fragment! And more");
        });

        sleep(Duration::from_secs(20)).await;
        let entries = drain(&mut rx);

        let labels: Vec<_> = entries.iter().map(|e| e.timestamp_label).collect();
        assert_eq!(labels, ["0:02", "0:05", "0:09", "0:14"]);
        let texts: Vec<_> = entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(
            texts,
            [
                "First fragment.",
                "Second fragment!",
                "Second fragment!",
                "Second fragment!"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_fragments_reveals_nothing() {
        let scheduler = RevealScheduler::default();
        let (sink, mut rx) = channel_sink();
        scheduler.schedule(7, FragmentBuffer::default(), sink);

        sleep(Duration::from_secs(20)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_fragment_reveals_nothing() {
        let scheduler = RevealScheduler::default();
        let buffer = FragmentBuffer::default();
        buffer.push("**  **\n");
        let (sink, mut rx) = channel_sink();
        scheduler.schedule(4, buffer.clone(), sink);

        sleep(Duration::from_secs(3)).await;
        buffer.push("Real thought. More");
        sleep(Duration::from_secs(20)).await;

        let entries = drain(&mut rx);
        let labels: Vec<_> = entries.iter().map(|e| e.timestamp_label).collect();
        assert_eq!(labels, ["0:05", "0:09", "0:14"]);
        assert!(entries.iter().all(|e| e.text == "Real thought."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_first_fragment_skips_earlier_offsets() {
        let scheduler = RevealScheduler::default();
        let buffer = FragmentBuffer::default();
        let (sink, mut rx) = channel_sink();
        scheduler.schedule(2, buffer.clone(), sink);

        sleep(Duration::from_secs(6)).await;
        buffer.push("Only thought.");
        sleep(Duration::from_secs(20)).await;

        let labels: Vec<_> = drain(&mut rx).iter().map(|e| e.timestamp_label).collect();
        assert_eq!(labels, ["0:09", "0:14"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_pending_reveals() {
        let scheduler = RevealScheduler::default();
        let buffer = FragmentBuffer::default();
        buffer.push("Early thought.");
        let (sink, mut rx) = channel_sink();
        scheduler.schedule(3, buffer, sink);

        sleep(Duration::from_secs(3)).await;
        scheduler.cancel(3);
        sleep(Duration::from_secs(20)).await;

        let entries = drain(&mut rx);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp_label, "0:02");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_only_affects_its_session() {
        let scheduler = RevealScheduler::default();
        let old = FragmentBuffer::default();
        old.push("Stale.");
        let new = FragmentBuffer::default();
        new.push("Fresh.");

        let (old_sink, mut old_rx) = channel_sink();
        let (new_sink, mut new_rx) = channel_sink();
        scheduler.schedule(1, old, old_sink);
        scheduler.schedule(2, new, new_sink);
        scheduler.cancel(1);

        sleep(Duration::from_secs(20)).await;
        assert!(drain(&mut old_rx).is_empty());
        assert_eq!(drain(&mut new_rx).len(), MAX_REVEALED);
    }
}
