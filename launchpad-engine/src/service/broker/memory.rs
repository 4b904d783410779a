//! An in-memory resource broker.
//!
//! The broker serves a fixed policy, per scaling group capacity and folder
//! list, and records every session it is asked to create. It also answers
//! name checks against the sessions it considers running.

use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use indexmap::IndexSet;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;
use uuid::Uuid;

use crate::allocation::Preset;
use crate::mount::Folder;
use crate::request::SessionRequest;
use crate::resource::Capacity;
use crate::resource::Policy;
use crate::service::NamingService;
use crate::service::broker::Created;
use crate::service::broker::Error;
use crate::service::broker::ResourceBroker;

/// The mutable state of the broker.
#[derive(Debug, Default)]
struct State {
    /// The names of the running sessions.
    running: IndexSet<String>,

    /// The requests of every session created.
    created: Vec<SessionRequest>,

    /// The current scaling group.
    scaling_group: Option<String>,
}

/// An in-memory resource broker.
#[derive(Debug, Default)]
pub struct Broker {
    /// The resource policy.
    policy: Policy,

    /// The capacity per scaling group.
    capacity: IndexMap<String, Capacity>,

    /// The folders available to every owner.
    folders: Vec<Folder>,

    /// The resource presets.
    presets: Vec<Preset>,

    /// Session names whose creation fails.
    failing: IndexSet<String>,

    /// Whether listing folders fails.
    folders_unavailable: bool,

    /// How long each session creation takes.
    latency: Option<Duration>,

    /// The mutable state.
    state: Mutex<State>,
}

impl Broker {
    /// Creates a broker serving a resource policy.
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Adds a scaling group with the given capacity.
    pub fn with_scaling_group(mut self, name: impl Into<String>, capacity: Capacity) -> Self {
        self.capacity.insert(name.into(), capacity);
        self
    }

    /// Sets the available folders.
    pub fn with_folders<I>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = Folder>,
    {
        self.folders = folders.into_iter().collect();
        self
    }

    /// Sets the resource presets.
    pub fn with_presets(mut self, presets: Vec<Preset>) -> Self {
        self.presets = presets;
        self
    }

    /// Marks sessions as already running.
    pub fn with_running<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .get_mut()
            .running
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Makes the creation of a session with the given name fail.
    pub fn with_failing_session(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    /// Makes listing folders fail.
    pub fn with_folders_unavailable(mut self) -> Self {
        self.folders_unavailable = true;
        self
    }

    /// Makes every session creation take the given time.
    ///
    /// Creations that take longer than their timeout fail with
    /// [`Error::Timeout`] and are not recorded.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Gets the requests of every session created so far.
    pub async fn created(&self) -> Vec<SessionRequest> {
        self.state.lock().await.created.clone()
    }

    /// Gets the current scaling group.
    pub async fn scaling_group(&self) -> Option<String> {
        self.state.lock().await.scaling_group.clone()
    }

    /// Creates a session once the configured latency has passed.
    async fn create(
        &self,
        kernel_ref: &str,
        name: &str,
        request: &SessionRequest,
        architecture: &str,
    ) -> Result<Created, Error> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.contains(name) {
            return Err(Error::Request(format!(
                "the agent rejected session `{name}`"
            )));
        }

        let mut state = self.state.lock().await;
        if !state.running.insert(name.to_string()) {
            return Err(Error::Conflict(name.to_string()));
        }

        state.created.push(request.clone());

        let session_id = Uuid::new_v4().to_string();
        info!(
            "created session `{name}` ({session_id}) from `{kernel_ref}` on `{architecture}`"
        );

        Ok(Created {
            created: true,
            session_id,
        })
    }
}

#[async_trait]
impl ResourceBroker for Broker {
    async fn list_resource_policy(&self) -> Result<Policy, Error> {
        Ok(self.policy.clone())
    }

    async fn list_available_capacity(&self, scaling_group: &str) -> Result<Capacity, Error> {
        self.capacity
            .get(scaling_group)
            .cloned()
            .ok_or_else(|| Error::UnknownScalingGroup(scaling_group.to_string()))
    }

    async fn list_folders(&self, owner: Option<&str>) -> Result<Vec<Folder>, Error> {
        if self.folders_unavailable {
            return Err(Error::Request(String::from("the storage proxy is unreachable")));
        }

        debug!(
            "listing {count} folder(s) for {owner}",
            count = self.folders.len(),
            owner = owner.unwrap_or("the current user")
        );
        Ok(self.folders.clone())
    }

    async fn list_presets(&self) -> Result<Vec<Preset>, Error> {
        Ok(self.presets.clone())
    }

    async fn create_session(
        &self,
        kernel_ref: &str,
        name: &str,
        request: &SessionRequest,
        timeout_ms: u64,
        architecture: &str,
    ) -> Result<Created, Error> {
        let create = self.create(kernel_ref, name, request, architecture);

        match tokio::time::timeout(Duration::from_millis(timeout_ms), create).await {
            Ok(result) => result,
            Err(_) => {
                warn!("creating session `{name}` timed out after {timeout_ms} ms");
                Err(Error::Timeout(timeout_ms))
            }
        }
    }

    async fn update_scaling_group(&self, scaling_group: &str) -> Result<(), Error> {
        if !self.capacity.contains_key(scaling_group) {
            return Err(Error::UnknownScalingGroup(scaling_group.to_string()));
        }

        self.state.lock().await.scaling_group = Some(scaling_group.to_string());
        Ok(())
    }
}

#[async_trait]
impl NamingService for Broker {
    async fn exists(&self, name: &str) -> Result<bool, Error> {
        Ok(self.state.lock().await.running.contains(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_scaling_groups_are_rejected() {
        let broker =
            Broker::new(Policy::default()).with_scaling_group("default", Capacity::default());

        assert!(broker.list_available_capacity("default").await.is_ok());
        assert_eq!(
            broker.update_scaling_group("gpu").await,
            Err(Error::UnknownScalingGroup(String::from("gpu")))
        );

        broker.update_scaling_group("default").await.unwrap();
        assert_eq!(broker.scaling_group().await.as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn running_sessions_are_known_names() {
        let broker = Broker::new(Policy::default()).with_running(["busy"]);

        assert!(broker.exists("busy").await.unwrap());
        assert!(!broker.exists("idle").await.unwrap());
    }
}
