//! Action queue bound to the interactive thread.
//!
//! Every hardware mutation triggered from another context (worker completion,
//! decoder state change, auto-focus timer) is posted here and runs strictly in
//! post order, one at a time.

use super::controller::Shared;
use crate::error::{Result, ScannerError};
use crate::geometry::Size;
use std::mem::discriminant;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug)]
pub(crate) enum Action {
    StopPreview,
    AutoFocus,
    FinishInitialization { attempt: u64, frame_size: Size },
    InitializationFailed(ScannerError),
}

enum Message {
    Post(Action),
    PostDelayed { action: Action, delay: Duration },
}

enum Wake {
    Message(Option<Message>),
    Timer,
}

struct Timer {
    deadline: Instant,
    action: Action,
}

/// Posts actions to the [`MainLoop`]
#[derive(Clone)]
pub(crate) struct MainThreadHandle {
    sender: mpsc::UnboundedSender<Message>,
}

impl MainThreadHandle {
    pub(crate) fn post(&self, action: Action) {
        if self.sender.send(Message::Post(action)).is_err() {
            trace!("Main loop is gone; dropping action");
        }
    }

    /// Run `action` after `delay`. A pending timer for the same kind of action is replaced.
    pub(crate) fn post_delayed(&self, action: Action, delay: Duration) {
        if self
            .sender
            .send(Message::PostDelayed { action, delay })
            .is_err()
        {
            trace!("Main loop is gone; dropping delayed action");
        }
    }
}

/// Interactive-thread executor for a [`CodeScanner`](super::CodeScanner).
///
/// Drive it from the same thread that calls the scanner's public methods, either
/// with [`MainLoop::run`] or step by step with [`MainLoop::turn`] /
/// [`MainLoop::run_pending`]. An initialization failure with no error callback
/// registered is returned as `Err` and ends the loop.
pub struct MainLoop {
    receiver: mpsc::UnboundedReceiver<Message>,
    timers: Vec<Timer>,
    scanner: Weak<Shared>,
}

/// The loop is unbound until [`MainLoop::bind`] attaches the scanner it serves.
pub(crate) fn channel() -> (MainThreadHandle, MainLoop) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        MainThreadHandle { sender },
        MainLoop {
            receiver,
            timers: Vec::new(),
            scanner: Weak::new(),
        },
    )
}

impl MainLoop {
    pub(crate) fn bind(&mut self, scanner: &Arc<Shared>) {
        self.scanner = Arc::downgrade(scanner);
    }

    /// Process actions until the scanner is dropped
    pub async fn run(mut self) -> Result<()> {
        while self.turn().await? {}
        Ok(())
    }

    /// Wait for the next posted action or due timer and run it.
    /// Returns `Ok(false)` once the scanner has been dropped.
    pub async fn turn(&mut self) -> Result<bool> {
        loop {
            let message = match self.next_deadline() {
                Some(deadline) => {
                    let wake = tokio::select! {
                        message = self.receiver.recv() => Wake::Message(message),
                        _ = tokio::time::sleep_until(deadline) => Wake::Timer,
                    };
                    match wake {
                        Wake::Timer => {
                            self.fire_next_timer()?;
                            return Ok(true);
                        }
                        Wake::Message(message) => message,
                    }
                }
                None => self.receiver.recv().await,
            };

            match message {
                Some(Message::Post(action)) => {
                    self.dispatch(action)?;
                    return Ok(true);
                }
                Some(Message::PostDelayed { action, delay }) => self.schedule(action, delay),
                None => return Ok(false),
            }
        }
    }

    /// Run everything that is ready now without waiting; returns the number of actions run.
    pub fn run_pending(&mut self) -> Result<usize> {
        let mut processed = 0;

        while let Ok(message) = self.receiver.try_recv() {
            match message {
                Message::Post(action) => {
                    self.dispatch(action)?;
                    processed += 1;
                }
                Message::PostDelayed { action, delay } => self.schedule(action, delay),
            }
        }

        let now = Instant::now();
        while self.next_deadline().is_some_and(|deadline| deadline <= now) {
            self.fire_next_timer()?;
            processed += 1;
        }

        Ok(processed)
    }

    /// Timers waiting to fire
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    fn schedule(&mut self, action: Action, delay: Duration) {
        let kind = discriminant(&action);
        self.timers
            .retain(|timer| discriminant(&timer.action) != kind);
        self.timers.push(Timer {
            deadline: Instant::now() + delay,
            action,
        });
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|timer| timer.deadline).min()
    }

    fn fire_next_timer(&mut self) -> Result<()> {
        let earliest = self
            .timers
            .iter()
            .enumerate()
            .min_by_key(|(_, timer)| timer.deadline)
            .map(|(index, _)| index);

        match earliest {
            Some(index) => {
                let timer = self.timers.swap_remove(index);
                self.dispatch(timer.action)
            }
            None => Ok(()),
        }
    }

    fn dispatch(&mut self, action: Action) -> Result<()> {
        trace!("Running {:?}", action);
        match self.scanner.upgrade() {
            Some(scanner) => scanner.handle_action(action),
            None => match action {
                Action::InitializationFailed(error) => Err(error),
                _ => Ok(()),
            },
        }
    }
}
