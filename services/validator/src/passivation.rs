//! Idle-timeout companion
//!
//! A small timer task beside each validator. `Start` arms the countdown,
//! `Stop` disarms it (clients are connected), and `CommandReceived` restarts
//! it. When the countdown elapses the timer emits one timeout signal and
//! disarms until told otherwise; the validator treats the signal as its cue
//! to passivate.

use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::debug;

/// Control messages for the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Arm the countdown (no clients connected).
    Start,
    /// Disarm the countdown (clients connected).
    Stop,
    /// A command arrived; restart the countdown.
    CommandReceived,
}

/// Handle to a running timer.
pub struct TimerHandle {
    pub commands: UnboundedSender<TimerCommand>,
    pub timeouts: UnboundedReceiver<()>,
}

/// Spawn a timer task, armed from the start.
pub fn spawn(timeout: Duration) -> TimerHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (timeout_tx, timeout_rx) = mpsc::unbounded_channel();
    tokio::spawn(run(timeout, command_rx, timeout_tx));
    TimerHandle {
        commands: command_tx,
        timeouts: timeout_rx,
    }
}

async fn run(
    timeout: Duration,
    mut commands: UnboundedReceiver<TimerCommand>,
    timeouts: UnboundedSender<()>,
) {
    let mut armed = true;
    let mut deadline = Instant::now() + timeout;
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                None => break,
                Some(TimerCommand::Start) => {
                    armed = true;
                    deadline = Instant::now() + timeout;
                }
                Some(TimerCommand::Stop) => armed = false,
                Some(TimerCommand::CommandReceived) => {
                    deadline = Instant::now() + timeout;
                }
            },
            _ = tokio::time::sleep_until(deadline), if armed => {
                debug!("idle timeout elapsed");
                armed = false;
                if timeouts.send(()).is_err() {
                    break;
                }
            }
        }
    }
}
