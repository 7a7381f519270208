//! Scripted in-memory transport for connection tests

use futures_util::future::BoxFuture;
use futures_util::{stream, FutureExt, StreamExt};
use signage_core::{Error, Result};
use signage_networking::{EventTransport, FrameStream, SseFrame};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

enum Step {
    Fail(String),
    Open(mpsc::UnboundedReceiver<Result<SseFrame>>),
}

/// Hands out scripted outcomes, one per `open`; fails once the script runs dry
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    opens: AtomicUsize,
    last_event_ids: Mutex<Vec<Option<String>>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Next open fails with a transport error
    pub(crate) fn push_failure(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Step::Fail(message.to_string()));
    }

    /// Next open succeeds; frames sent on the returned channel are delivered,
    /// and dropping it closes the stream
    pub(crate) fn push_open(&self) -> mpsc::UnboundedSender<Result<SseFrame>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().unwrap().push_back(Step::Open(rx));
        tx
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn last_event_ids(&self) -> Vec<Option<String>> {
        self.last_event_ids.lock().unwrap().clone()
    }
}

impl EventTransport for ScriptedTransport {
    fn open(&self, last_event_id: Option<String>) -> BoxFuture<'static, Result<FrameStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.last_event_ids.lock().unwrap().push(last_event_id);
        let step = self.script.lock().unwrap().pop_front();

        async move {
            match step {
                Some(Step::Open(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
                .boxed()),
                Some(Step::Fail(message)) => Err(Error::Transport(message)),
                None => Err(Error::Transport("connection refused".to_string())),
            }
        }
        .boxed()
    }
}

/// Poll `condition` while letting (paused) time advance
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}
