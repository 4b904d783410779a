//! The resource broker a launch dialog talks to.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::allocation::Preset;
use crate::mount::Folder;
use crate::request::SessionRequest;
use crate::resource::Capacity;
use crate::resource::Policy;

pub mod memory;

/// An error reported by a resource broker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The request could not be completed.
    #[error("{0}")]
    Request(String),

    /// The request did not complete in time.
    #[error("the request timed out after {0} ms")]
    Timeout(u64),

    /// The scaling group does not exist.
    #[error("scaling group `{0}` does not exist")]
    UnknownScalingGroup(String),

    /// A session with the same name already exists.
    #[error("a session named `{0}` already exists")]
    Conflict(String),
}

/// The result of a session creation call.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Created {
    /// Whether a new session was created (rather than an existing one reused).
    pub created: bool,

    /// The id assigned to the session.
    pub session_id: String,
}

/// A broker of cluster resources and sessions.
#[async_trait]
pub trait ResourceBroker: Debug + Send + Sync + 'static {
    /// Lists the resource policy of the current account/keypair.
    async fn list_resource_policy(&self) -> Result<Policy, Error>;

    /// Lists the capacity currently available in a scaling group.
    async fn list_available_capacity(&self, scaling_group: &str) -> Result<Capacity, Error>;

    /// Lists the storage folders available to an owner (or to the current
    /// user when `owner` is `None`).
    async fn list_folders(&self, owner: Option<&str>) -> Result<Vec<Folder>, Error>;

    /// Lists the resource presets.
    async fn list_presets(&self) -> Result<Vec<Preset>, Error> {
        Ok(Vec::new())
    }

    /// Creates a session.
    async fn create_session(
        &self,
        kernel_ref: &str,
        name: &str,
        request: &SessionRequest,
        timeout_ms: u64,
        architecture: &str,
    ) -> Result<Created, Error>;

    /// Makes a scaling group the current one.
    async fn update_scaling_group(&self, scaling_group: &str) -> Result<(), Error>;
}
