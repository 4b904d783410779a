//! Periodic refreshes of the resource policy and capacity.

use std::sync::Arc;
use std::time::Duration;

use launchpad_events::Event;
use launchpad_events::Sender;
use launchpad_events::send_event;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::resource::Capacity;
use crate::resource::Policy;
use crate::service::ResourceBroker;
use crate::service::Slot;
use crate::service::broker::Error;

/// The shortest interval between background refreshes.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// The resource policy and capacity fetched together.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// The scaling group the capacity belongs to.
    pub scaling_group: String,

    /// The resource policy.
    pub policy: Policy,

    /// The capacity of the scaling group.
    pub capacity: Capacity,
}

/// Fetches a snapshot in the given slot.
///
/// Returns `None` (and reports the drop) if a refresh is already in flight.
pub async fn fetch(
    broker: &dyn ResourceBroker,
    scaling_group: &str,
    slot: &Slot,
    events: Option<&Sender>,
) -> Option<Result<Snapshot, Error>> {
    let fetched = slot
        .run(async {
            let policy = broker.list_resource_policy().await?;
            let capacity = broker.list_available_capacity(scaling_group).await?;
            Ok::<_, Error>(Snapshot {
                scaling_group: scaling_group.to_string(),
                policy,
                capacity,
            })
        })
        .await;

    if fetched.is_none() {
        debug!("a resource refresh is already in flight; dropping this one");
        send_event!(
            events,
            Event::RefreshDropped {
                scaling_group: scaling_group.to_string()
            }
        );
    }

    fetched
}

/// A background task refreshing a [`Snapshot`] on an interval.
///
/// The task stops when the refresher is stopped or dropped.
#[derive(Debug)]
pub struct Refresher {
    /// The cancellation token of the task.
    token: CancellationToken,

    /// The task handle.
    handle: Option<JoinHandle<()>>,

    /// The latest snapshot.
    receiver: watch::Receiver<Option<Snapshot>>,
}

impl Refresher {
    /// Spawns a refresher.
    ///
    /// The first refresh happens immediately. Refreshes share `slot` with any
    /// other resource refresh, so ticks that overlap one are skipped. Intervals
    /// shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn spawn(
        broker: Arc<dyn ResourceBroker>,
        scaling_group: impl Into<String>,
        slot: Slot,
        interval: Duration,
        events: Option<Sender>,
    ) -> Self {
        let token = CancellationToken::new();
        let (sender, receiver) = watch::channel(None);
        let scaling_group = scaling_group.into();

        if interval < MIN_INTERVAL {
            warn!(
                "refresh interval of {interval:?} is too short; using {MIN_INTERVAL:?} instead"
            );
        }
        let interval = interval.max(MIN_INTERVAL);

        let cancelled = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        trace!("refreshing resources of `{scaling_group}`");

                        match fetch(broker.as_ref(), &scaling_group, &slot, events.as_ref()).await {
                            Some(Ok(snapshot)) => {
                                sender.send_replace(Some(snapshot));
                            }
                            Some(Err(e)) => warn!("failed to refresh resources: {e}"),
                            None => {}
                        }
                    }
                }
            }

            debug!("resource refresher for `{scaling_group}` stopped");
        });

        Self {
            token,
            handle: Some(handle),
            receiver,
        }
    }

    /// Gets the latest snapshot, if one has been fetched.
    pub fn latest(&self) -> Option<Snapshot> {
        self.receiver.borrow().clone()
    }

    /// Subscribes to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.receiver.clone()
    }

    /// Stops the refresher and waits for its task to finish.
    pub async fn stop(mut self) {
        self.token.cancel();

        if let Some(handle) = self.handle.take() {
            handle.await.ok();
        }
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
