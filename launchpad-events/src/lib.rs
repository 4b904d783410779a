//! Definition of the events broadcast by Launchpad.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Gets the next launch request id.
pub fn next_request_id() -> u64 {
    static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(0);
    NEXT_REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// An event sent while a launch dialog is being driven.
#[derive(Debug, Clone)]
pub enum Event {
    /// The per-dimension limits were (re)resolved.
    LimitsResolved {
        /// Whether every dimension ended up feasible.
        feasible: bool,
    },
    /// A dimension could not be satisfied by the intersection of its sources.
    ///
    /// This event is always followed by the submission path being disabled
    /// until the limits are resolved again.
    AllocationInfeasible {
        /// The slot name of the offending dimension.
        dimension: String,
    },
    /// The shared memory value was lowered to stay within memory.
    SharedMemoryReduced {
        /// The previous shared memory value (GiB).
        from: f64,
        /// The new shared memory value (GiB).
        to: f64,
    },
    /// A resource refresh was requested while another one was in flight and
    /// was dropped.
    RefreshDropped {
        /// The scaling group the dropped refresh was for.
        scaling_group: String,
    },
    /// The wizard moved to another step.
    StepChanged {
        /// The name of the step that was entered.
        step: &'static str,
    },
    /// A session creation call has been dispatched.
    ///
    /// This event is always paired with a `SessionCreated` or
    /// `SessionCreateFailed` event carrying the same id.
    SessionCreateRequested {
        /// The id of the creation request.
        id: u64,
        /// The requested session name.
        name: String,
    },
    /// A session creation call succeeded.
    SessionCreated {
        /// The id of the creation request.
        id: u64,
        /// The id of the session assigned by the broker.
        session_id: String,
        /// Whether the broker reported a brand new session (as opposed to a
        /// reused one).
        created: bool,
    },
    /// A session creation call failed.
    SessionCreateFailed {
        /// The id of the creation request.
        id: u64,
        /// The error message.
        message: String,
    },
}

/// Sends an event through a broadcast channel.
///
/// If the sender is `None`, the event expression is not evaluated and no event
/// is sent.
#[macro_export]
macro_rules! send_event {
    ($sender:expr, $event:expr $(,)?) => {
        if let Some(sender) = &$sender {
            sender.send($event).ok();
        }
    };
}

/// The broadcast sender type used throughout the engine.
pub type Sender = tokio::sync::broadcast::Sender<Event>;
