//! Debounced invocation of asynchronous callbacks.
//!
//! Used for live search (e.g. brand or category name completion): every
//! keystroke calls [Debouncer::invoke], but only the last call within the
//! delay window reaches the backend. Superseded calls never run, and a
//! call that is already running is cancelled through its
//! [CancellationToken].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::trace;

type Callback<A, T> = Arc<dyn Fn(A, CancellationToken) -> BoxFuture<'static, T> + Send + Sync>;

/// Lifecycle of the most recent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebouncePhase {
    /// Nothing scheduled or running.
    Idle,
    /// Waiting for the delay to elapse.
    Armed,
    /// The callback is running.
    Fired,
    /// Torn down by [Debouncer::cancel].
    Cancelled,
}

#[derive(Debug)]
struct State {
    generation: u64,
    current: Option<CancellationToken>,
    phase: DebouncePhase,
}

impl State {
    fn set_phase(&mut self, generation: u64, phase: DebouncePhase) {
        if self.generation == generation {
            self.phase = phase;
        }
    }
}

/// Delays a callback and suppresses all but the latest invocation.
///
/// Invocations are driven by tasks spawned on the current tokio runtime,
/// so the delay starts when [Debouncer::invoke] is called, not when the
/// returned [Pending] is first polled.
///
/// Dropping the debouncer cancels whatever is pending or running.
pub struct Debouncer<A, T> {
    callback: Callback<A, T>,
    delay: Duration,
    state: Arc<Mutex<State>>,
}

impl<A, T> std::fmt::Debug for Debouncer<A, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl<A, T> Debouncer<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    pub fn new<F, Fut>(callback: F, delay: Duration) -> Self
    where
        F: Fn(A, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let boxed: Callback<A, T> =
            Arc::new(move |args: A, token: CancellationToken| -> BoxFuture<'static, T> {
                Box::pin(callback(args, token))
            });
        Self {
            callback: boxed,
            delay,
            state: Arc::new(Mutex::new(State {
                generation: 0,
                current: None,
                phase: DebouncePhase::Idle,
            })),
        }
    }

    /// Schedule the callback with `args`, superseding any earlier call.
    ///
    /// The returned [Pending] resolves to `Some(result)` if this call ran to
    /// completion, or `None` if it was superseded or cancelled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn invoke(&self, args: A) -> Pending<T> {
        let token = CancellationToken::new();
        let generation = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = state.current.replace(token.clone()) {
                previous.cancel();
            }
            state.generation = state.generation.wrapping_add(1);
            state.phase = DebouncePhase::Armed;
            state.generation
        };

        let (sender, receiver) = oneshot::channel();
        let callback = Arc::clone(&self.callback);
        let state = Arc::clone(&self.state);
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    trace!(generation, "debounced call superseded before firing");
                    return;
                },
                _ = tokio::time::sleep(delay) => {},
            }

            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .set_phase(generation, DebouncePhase::Fired);
            trace!(generation, "debounced call fired");

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = callback(args, token.clone()) => Some(result),
            };

            {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if state.generation == generation {
                    state.phase = DebouncePhase::Idle;
                    state.current = None;
                }
            }

            match result {
                Some(result) => {
                    // The caller may have stopped waiting, that's fine.
                    let _ = sender.send(result);
                },
                None => trace!(generation, "debounced call cancelled while running"),
            }
        });

        Pending { receiver }
    }
}

impl<A, T> Debouncer<A, T> {
    /// Clear any pending timer and abort a running call.
    ///
    /// Idempotent, and a no-op when nothing is scheduled.
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = state.current.take() {
            token.cancel();
            state.generation = state.generation.wrapping_add(1);
            state.phase = DebouncePhase::Cancelled;
            trace!("debouncer cancelled");
        }
    }

    pub fn phase(&self) -> DebouncePhase {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .phase
    }
}

impl<A, T> Drop for Debouncer<A, T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Result of a single [Debouncer::invoke].
#[derive(Debug)]
#[must_use = "dropping a Pending does not cancel the call, use Debouncer::cancel"]
pub struct Pending<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> Future for Pending<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(Result::ok)
    }
}
