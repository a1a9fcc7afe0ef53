//! Cancellable delayed actions.
//!
//! Cancellation is best effort: an action whose delay has elapsed may already
//! be running when `cancel` is called. Every action therefore receives a
//! [`TimerTicket`] and must re-check it after taking the lock that its owner
//! cancels under. Cancel under lock + re-check under the same lock closes the
//! cancel/fire race.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Validity of one scheduled action, as seen from inside the action.
#[derive(Debug, Clone)]
pub struct TimerTicket {
    token: CancellationToken,
}

impl TimerTicket {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Owned handle to an action that runs once after a delay unless cancelled.
/// Dropping the handle cancels the action.
#[derive(Debug)]
pub struct DelayedAction {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl DelayedAction {
    /// Schedule on the current tokio runtime.
    pub fn spawn<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: FnOnce(TimerTicket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn_on(&Handle::current(), delay, action)
    }

    /// Schedule on `handle`, usable from threads outside the runtime.
    pub fn spawn_on<F, Fut>(handle: &Handle, delay: Duration, action: F) -> Self
    where
        F: FnOnce(TimerTicket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let watch = token.clone();
        let ticket = TimerTicket { token: token.clone() };

        let task = handle.spawn(async move {
            tokio::select! {
                biased;
                _ = watch.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !ticket.is_cancelled() {
                        action(ticket).await;
                    }
                }
            }
        });

        Self { token, task }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Neither cancelled nor finished running.
    pub fn is_pending(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }
}

impl Drop for DelayedAction {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
