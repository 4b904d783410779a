//! Session creation requests.
//!
//! A [`SessionRequest`] is the payload handed to
//! [`ResourceBroker::create_session`](crate::service::ResourceBroker::create_session).
//! Requests are only ever produced by a [`Builder`], which validates every
//! input first; a new set of requests is built for each launch attempt.

use chrono::DateTime;
use chrono::Utc;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::allocation::ClusterMode;
use crate::mount;
use crate::resource::Infeasible;
use crate::service::broker;

mod builder;

pub use builder::Builder;

/// The kind of workload a session runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// An interactive session.
    #[default]
    Interactive,

    /// A batch session running a startup command.
    Batch,

    /// An inference session.
    Inference,
}

/// A reason a request could not be built.
///
/// Variants are ordered as they are checked; the first failure is reported.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required value was missing for a builder field.
    #[error("missing required value for `{0}` in session request builder")]
    Missing(&'static str),

    /// The session name is malformed.
    #[error(
        "`{0}` is not a valid session name: use 4 to 64 letters, digits, `.`, `_` or `-`, \
         starting and ending with a letter or digit"
    )]
    InvalidName(String),

    /// A session with the same name is already running.
    #[error("a session named `{0}` is already running")]
    DuplicateName(String),

    /// The running sessions could not be checked for the name.
    #[error("failed to check whether the session name is in use")]
    NameCheck(#[source] broker::Error),

    /// The image or its tag has not been chosen.
    #[error("an image and a version must be selected")]
    ImageNotSelected,

    /// A batch session has no startup command.
    #[error("a batch session needs a startup command")]
    MissingStartupCommand,

    /// A batch session is scheduled to start in the past.
    #[error("the scheduled start time ({0}) must be in the future")]
    StartInPast(DateTime<Utc>),

    /// The resources cannot be satisfied.
    #[error(transparent)]
    Infeasible(#[from] Infeasible),

    /// Two folders mount at the same path.
    #[error(transparent)]
    Mount(#[from] mount::Error),
}

/// A request to create a single session.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SessionRequest {
    /// The kernel reference of the image.
    image: String,

    /// The architecture to run on.
    architecture: String,

    /// The kind of workload.
    #[serde(rename = "type")]
    session_type: SessionType,

    /// The per-container resource values keyed by slot name.
    resources: IndexMap<String, f64>,

    /// The cluster mode.
    cluster_mode: ClusterMode,

    /// The cluster size.
    cluster_size: u32,

    /// The folders to mount.
    mounts: Vec<String>,

    /// The aliased folders and their mount paths.
    mount_map: IndexMap<String, String>,

    /// The environment variables.
    environ: IndexMap<String, String>,

    /// The ports to open before the session starts.
    preopen_ports: Vec<u16>,

    /// The session name.
    name: String,

    /// The startup command of a batch session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    startup_command: Option<String>,

    /// The scheduled start time of a batch session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    starts_at: Option<DateTime<Utc>>,

    /// The access key of the user the session is created for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner_access_key: Option<String>,
}

impl SessionRequest {
    /// Creates a [`Builder`] for session requests.
    pub fn builder<'a>() -> Builder<'a> {
        Builder::default()
    }

    /// Gets the kernel reference of the image.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Gets the architecture.
    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// Gets the session type.
    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    /// Gets the per-container resource values.
    pub fn resources(&self) -> &IndexMap<String, f64> {
        &self.resources
    }

    /// Gets the cluster mode.
    pub fn cluster_mode(&self) -> ClusterMode {
        self.cluster_mode
    }

    /// Gets the cluster size.
    pub fn cluster_size(&self) -> u32 {
        self.cluster_size
    }

    /// Gets the folders to mount.
    pub fn mounts(&self) -> &[String] {
        &self.mounts
    }

    /// Gets the mount map.
    pub fn mount_map(&self) -> &IndexMap<String, String> {
        &self.mount_map
    }

    /// Gets the environment variables.
    pub fn environ(&self) -> &IndexMap<String, String> {
        &self.environ
    }

    /// Gets the ports to pre-open.
    pub fn preopen_ports(&self) -> &[u16] {
        &self.preopen_ports
    }

    /// Gets the session name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the startup command.
    pub fn startup_command(&self) -> Option<&str> {
        self.startup_command.as_deref()
    }

    /// Gets the scheduled start time.
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.starts_at
    }

    /// Gets the access key of the owner.
    pub fn owner_access_key(&self) -> Option<&str> {
        self.owner_access_key.as_deref()
    }

    /// Gets the total amount of a slot across the cluster.
    pub fn aggregate(&self, slot: &str) -> Option<f64> {
        self.resources
            .get(slot)
            .map(|value| value * f64::from(self.cluster_size))
    }
}
