//! The launch wizard.
//!
//! A [`Wizard`] drives one launch dialog from opening to submission:
//!
//! ```text
//! Environment ──► Mounts ──► Resources ──► Review ──► submit()
//!      └──────── (inference) ────►┘
//! ```
//!
//! Moving forward validates the step being left; moving back never does.
//! Entering the mount step refreshes the folder list from the broker.
//! Resource refreshes are single-flight: one that arrives while another is in
//! flight (including a background [`Refresher`](crate::service::Refresher)
//! tick) is dropped.

use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use futures::future::join_all;
use launchpad_config::Config;
use launchpad_config::Session;
use launchpad_events::Event;
use launchpad_events::Sender;
use launchpad_events::next_request_id;
use launchpad_events::send_event;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::allocation::Adjustment;
use crate::allocation::Allocation;
use crate::allocation::ClusterMode;
use crate::allocation::Preset;
use crate::editor::EnvEditor;
use crate::editor::PortEditor;
use crate::image::Image;
use crate::mount;
use crate::mount::Selection;
use crate::request::SessionRequest;
use crate::request::SessionType;
use crate::request::ValidationError;
use crate::resource::Capacity;
use crate::resource::Dimension;
use crate::resource::Infeasible;
use crate::resource::Limits;
use crate::resource::Policy;
use crate::service::NamingService;
use crate::service::NotificationService;
use crate::service::ResourceBroker;
use crate::service::Slot;
use crate::service::broker;
use crate::service::broker::Created;
use crate::service::naming::is_valid_name;
use crate::service::refresh;
use crate::service::refresh::Snapshot;

/// A step of the wizard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The image, session type and name.
    Environment,

    /// The folders to mount.
    Mounts,

    /// The resources.
    Resources,

    /// The summary, from which the sessions are submitted.
    Review,
}

impl Step {
    /// Gets the name of the step.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Environment => "environment",
            Step::Mounts => "mounts",
            Step::Resources => "resources",
            Step::Review => "review",
        }
    }
}

/// An error raised by the wizard.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The inputs did not validate.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A folder selection change was rejected.
    #[error(transparent)]
    Mount(#[from] mount::Error),

    /// The resources cannot be satisfied; the launch is blocked.
    #[error(transparent)]
    Blocked(#[from] Infeasible),

    /// A call to the broker failed.
    #[error(transparent)]
    Broker(#[from] broker::Error),

    /// A resource refresh is already in flight.
    #[error("a resource refresh is already in progress")]
    Busy,

    /// Sessions can only be submitted from the review step.
    #[error("sessions can only be submitted from the review step")]
    NotOnReview,

    /// The wizard has been closed.
    #[error("the launch dialog is closed")]
    Closed,
}

/// The services a wizard talks to.
#[derive(Clone)]
pub struct Services {
    /// The resource broker.
    pub broker: Arc<dyn ResourceBroker>,

    /// The notification sink.
    pub notifier: Arc<dyn NotificationService>,

    /// The session name checker.
    pub naming: Arc<dyn NamingService>,
}

/// The outcome of one session creation call.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    /// The session name.
    pub name: String,

    /// The result of the call.
    pub result: Result<Created, broker::Error>,
}

/// The result of a submission.
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
    /// No folder is mounted; the launch must be confirmed with
    /// [`Wizard::confirm_no_folder`] and submitted again.
    ConfirmNoFolder,

    /// Every creation call has settled.
    Dispatched(Vec<Outcome>),
}

/// A launch dialog.
pub struct Wizard {
    /// The services.
    services: Services,

    /// The platform configuration.
    config: Config,

    /// The event sender.
    events: Option<Sender>,

    /// The current step.
    step: Step,

    /// Whether the dialog has closed.
    closed: bool,

    /// The current scaling group.
    scaling_group: String,

    /// The latest resource policy.
    policy: Policy,

    /// The latest capacity of the scaling group.
    capacity: Capacity,

    /// The resource presets.
    presets: Vec<Preset>,

    /// The chosen image.
    image: Image,

    /// The session type.
    session_type: SessionType,

    /// The session name (blank for a generated one).
    name: String,

    /// The startup command of a batch session.
    startup_command: String,

    /// The scheduled start time of a batch session.
    starts_at: Option<DateTime<Utc>>,

    /// The access key of the user sessions are created for.
    owner: Option<String>,

    /// The chosen resources.
    allocation: Allocation,

    /// The chosen folders.
    mounts: Selection,

    /// The environment variable editor.
    environ: EnvEditor,

    /// The pre-opened port editor.
    ports: PortEditor,

    /// Whether launching without folders has been confirmed.
    no_folder_confirmed: bool,

    /// The slot shared by every resource refresh.
    refresh_slot: Slot,
}

impl Wizard {
    /// Opens a launch dialog on a scaling group.
    ///
    /// The resource policy, the capacity of the scaling group and the presets
    /// are fetched once; every value starts at its minimum.
    pub async fn open(
        services: Services,
        config: Config,
        scaling_group: impl Into<String>,
        events: Option<Sender>,
    ) -> Result<Self, Error> {
        let scaling_group = scaling_group.into();
        let policy = services.broker.list_resource_policy().await?;
        let capacity = services
            .broker
            .list_available_capacity(&scaling_group)
            .await?;
        let presets = services.broker.list_presets().await?;

        let image = Image::default();
        let limits = Limits::resolve(
            image.limits(),
            &policy,
            &capacity,
            config.ceilings(),
            config.session(),
        );

        let mut allocation = Allocation::new(limits)
            .with_presets_only(!config.session().allow_custom_resource_allocation());
        if let Some(events) = &events {
            allocation = allocation.with_events(events.clone());
        }

        let mounts = Selection::new(config.mounts().home());
        let ports = PortEditor::default().with_max_items(config.ports().max_count());

        info!("opened a launch dialog on scaling group `{scaling_group}`");

        let wizard = Self {
            services,
            config,
            events,
            step: Step::Environment,
            closed: false,
            scaling_group,
            policy,
            capacity,
            presets,
            image,
            session_type: SessionType::default(),
            name: String::new(),
            startup_command: String::new(),
            starts_at: None,
            owner: None,
            allocation,
            mounts,
            environ: EnvEditor::default(),
            ports,
            no_folder_confirmed: false,
            refresh_slot: Slot::default(),
        };

        wizard.report_limits();
        Ok(wizard)
    }

    /// Gets the current step.
    pub fn step(&self) -> Step {
        self.step
    }

    /// Whether the dialog has closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the dialog.
    ///
    /// Creation calls that are already in flight are not aborted.
    pub fn close(&mut self) {
        debug!("launch dialog closed");
        self.closed = true;
    }

    /// Gets the current scaling group.
    pub fn scaling_group(&self) -> &str {
        &self.scaling_group
    }

    /// Gets the chosen resources.
    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    /// Gets the folder selection.
    pub fn mounts(&self) -> &Selection {
        &self.mounts
    }

    /// Gets the folder selection for editing.
    pub fn mounts_mut(&mut self) -> &mut Selection {
        &mut self.mounts
    }

    /// Gets the environment variable editor.
    pub fn environ_mut(&mut self) -> &mut EnvEditor {
        &mut self.environ
    }

    /// Gets the pre-opened port editor.
    pub fn ports_mut(&mut self) -> &mut PortEditor {
        &mut self.ports
    }

    /// Gets the resource presets.
    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    /// Gets the slot shared by every resource refresh.
    ///
    /// Hand this to a [`Refresher`](crate::service::Refresher) so that
    /// periodic and on-demand refreshes never overlap.
    pub fn resource_slot(&self) -> Slot {
        self.refresh_slot.clone()
    }

    /// Selects the image and resolves the limits it declares.
    pub fn set_image(&mut self, image: Image) {
        debug!("selected image `{image}`", image = image.kernel_ref());
        self.image = image;
        self.resolve_limits();
    }

    /// Sets the session type.
    pub fn set_session_type(&mut self, session_type: SessionType) {
        self.session_type = session_type;
    }

    /// Sets the session name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Sets the startup command of a batch session.
    pub fn set_startup_command(&mut self, command: impl Into<String>) {
        self.startup_command = command.into();
    }

    /// Sets the scheduled start time of a batch session.
    pub fn set_starts_at(&mut self, starts_at: Option<DateTime<Utc>>) {
        self.starts_at = starts_at;
    }

    /// Creates the sessions for another user.
    pub fn set_owner(&mut self, access_key: Option<String>) {
        self.owner = access_key;
    }

    /// Sets a resource value (clamped into its range).
    ///
    /// Returns `None` if the dimension cannot be set, e.g., a per-container
    /// value when only presets are allowed.
    pub fn set_value(&mut self, dimension: Dimension, value: f64) -> Option<f64> {
        let stored = self.allocation.set_value(dimension, value);
        self.relay_adjustments();
        stored
    }

    /// Applies the preset with the given name.
    ///
    /// Returns `false` if there is no such preset.
    pub fn apply_preset(&mut self, name: &str) -> bool {
        let Some(preset) = self.presets.iter().find(|preset| preset.name() == name) else {
            warn!("no preset named `{name}`");
            return false;
        };

        self.allocation.apply_preset(preset);
        self.relay_adjustments();
        true
    }

    /// Sets the cluster mode.
    pub fn set_cluster_mode(&mut self, mode: ClusterMode) {
        self.allocation.set_cluster_mode(mode);
        self.relay_adjustments();
    }

    /// Sets the cluster size (clamped into its range).
    pub fn set_cluster_size(&mut self, size: u32) -> u32 {
        let size = self.allocation.set_cluster_size(size);
        self.relay_adjustments();
        size
    }

    /// Tells the user about corrections the allocation made on its own.
    fn relay_adjustments(&mut self) {
        for adjustment in self.allocation.drain_adjustments() {
            match adjustment {
                Adjustment::SharedMemoryReduced { to, .. } => self.services.notifier.show(
                    "Shared memory was reduced to stay within memory",
                    Some(&format!("{to} GiB")),
                    false,
                ),
                Adjustment::SessionsReset => self.services.notifier.show(
                    "Multi-node clusters launch a single session",
                    None,
                    false,
                ),
            }
        }
    }

    /// Resolves the limits from the latest policy, capacity and image.
    fn resolve_limits(&mut self) {
        let limits = Limits::resolve(
            self.image.limits(),
            &self.policy,
            &self.capacity,
            self.config.ceilings(),
            self.config.session(),
        );

        self.allocation.update_limits(limits);
        self.relay_adjustments();
        self.report_limits();
    }

    /// Reports the feasibility of the current limits.
    fn report_limits(&self) {
        let infeasible = self.allocation.infeasible();

        for dimension in &infeasible {
            warn!("`{dimension}` cannot be satisfied with the current policy and capacity");
            send_event!(
                self.events,
                Event::AllocationInfeasible {
                    dimension: dimension.slot().to_string(),
                }
            );
        }

        send_event!(
            self.events,
            Event::LimitsResolved {
                feasible: infeasible.is_empty(),
            }
        );
    }

    /// Applies a refreshed policy and capacity.
    ///
    /// Snapshots of another scaling group (e.g., from a refresher spawned
    /// before a switch) are ignored. Returns whether the snapshot was applied.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> bool {
        if snapshot.scaling_group != self.scaling_group {
            warn!(
                "ignoring a resource snapshot of `{}` while on `{}`",
                snapshot.scaling_group, self.scaling_group
            );
            return false;
        }

        self.policy = snapshot.policy;
        self.capacity = snapshot.capacity;
        self.resolve_limits();
        true
    }

    /// Refreshes the policy and capacity.
    ///
    /// Returns `false` if a refresh was already in flight and this one was
    /// dropped.
    pub async fn refresh_resources(&mut self) -> Result<bool, Error> {
        let fetched = refresh::fetch(
            self.services.broker.as_ref(),
            &self.scaling_group,
            &self.refresh_slot,
            self.events.as_ref(),
        )
        .await;

        match fetched {
            Some(Ok(snapshot)) => {
                self.apply_snapshot(snapshot);
                Ok(true)
            }
            Some(Err(e)) => {
                self.services.notifier.show(
                    "Failed to refresh the available resources",
                    Some(&e.to_string()),
                    true,
                );
                Err(e.into())
            }
            None => Ok(false),
        }
    }

    /// Switches to another scaling group and resolves its capacity.
    ///
    /// The current group and limits are kept unless the new group's capacity
    /// was fetched and the broker accepted the switch. A switch that overlaps
    /// a resource refresh fails with [`Error::Busy`].
    pub async fn select_scaling_group(
        &mut self,
        scaling_group: impl Into<String>,
    ) -> Result<(), Error> {
        let scaling_group = scaling_group.into();

        let fetched = refresh::fetch(
            self.services.broker.as_ref(),
            &scaling_group,
            &self.refresh_slot,
            self.events.as_ref(),
        )
        .await;

        let result = match fetched {
            Some(Ok(snapshot)) => self
                .services
                .broker
                .update_scaling_group(&scaling_group)
                .await
                .map(|_| snapshot),
            Some(Err(e)) => Err(e),
            None => {
                debug!("keeping scaling group `{}`", self.scaling_group);
                return Err(Error::Busy);
            }
        };

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.services.notifier.show(
                    "Failed to switch the resource group",
                    Some(&e.to_string()),
                    true,
                );
                return Err(e.into());
            }
        };

        info!("switched to scaling group `{scaling_group}`");
        self.scaling_group = scaling_group;
        self.apply_snapshot(snapshot);
        Ok(())
    }

    /// Refreshes the folder list.
    async fn refresh_folders(&mut self) -> Result<(), Error> {
        let fetched = self
            .services
            .broker
            .list_folders(self.owner.as_deref())
            .await;

        match fetched {
            Ok(folders) => {
                self.mounts.set_available(folders);
                Ok(())
            }
            Err(e) => {
                self.services.notifier.show(
                    "Failed to load the storage folders",
                    Some(&e.to_string()),
                    true,
                );
                Err(e.into())
            }
        }
    }

    /// Checks the inputs of the environment step.
    async fn check_environment(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();

        if !name.is_empty() {
            if !is_valid_name(name) {
                return Err(ValidationError::InvalidName(name.to_string()));
            }

            if self
                .services
                .naming
                .exists(name)
                .await
                .map_err(ValidationError::NameCheck)?
            {
                return Err(ValidationError::DuplicateName(name.to_string()));
            }
        }

        if self.session_type == SessionType::Batch {
            if self.startup_command.trim().is_empty() {
                return Err(ValidationError::MissingStartupCommand);
            }

            if let Some(starts_at) = self.starts_at.filter(|starts_at| *starts_at <= Utc::now()) {
                return Err(ValidationError::StartInPast(starts_at));
            }
        }

        Ok(())
    }

    /// Moves to the next step.
    ///
    /// The step being left is validated first; on failure the wizard stays
    /// where it is.
    pub async fn next(&mut self) -> Result<Step, Error> {
        if self.closed {
            return Err(Error::Closed);
        }

        let next = match self.step {
            Step::Environment => {
                self.check_environment().await?;

                if self.session_type == SessionType::Inference {
                    Step::Resources
                } else {
                    self.refresh_folders().await?;
                    Step::Mounts
                }
            }
            Step::Mounts => {
                self.mounts.check_collisions()?;
                Step::Resources
            }
            Step::Resources => {
                let infeasible = self.allocation.infeasible();

                if !infeasible.is_empty() {
                    let infeasible = Infeasible(infeasible);
                    self.services
                        .notifier
                        .show("Not enough resources", Some(&infeasible.to_string()), true);
                    return Err(infeasible.into());
                }

                Step::Review
            }
            Step::Review => Step::Review,
        };

        self.enter(next);
        Ok(next)
    }

    /// Moves to the previous step without validating anything.
    pub fn back(&mut self) -> Step {
        let previous = match self.step {
            Step::Environment | Step::Mounts => Step::Environment,
            Step::Resources if self.session_type == SessionType::Inference => Step::Environment,
            Step::Resources => Step::Mounts,
            Step::Review => Step::Resources,
        };

        self.enter(previous);
        previous
    }

    /// Enters a step.
    fn enter(&mut self, step: Step) {
        if self.step != step {
            debug!("entering the `{}` step", step.name());
            send_event!(self.events, Event::StepChanged { step: step.name() });
        }

        self.step = step;
    }

    /// Confirms launching without any folder mounted.
    pub fn confirm_no_folder(&mut self) {
        self.no_folder_confirmed = true;
    }

    /// Builds the session requests from the current inputs.
    pub async fn build_requests(&self) -> Result<Vec<SessionRequest>, ValidationError> {
        let mut builder = SessionRequest::builder()
            .allocation(&self.allocation)
            .mounts(&self.mounts)
            .environ(self.environ.committed())
            .ports(self.ports.committed())
            .image(&self.image)
            .session_type(self.session_type)
            .name(self.name.as_str())
            .startup_command(self.startup_command.as_str())
            .session(self.config.session());

        if let Some(starts_at) = self.starts_at {
            builder = builder.starts_at(starts_at);
        }

        if let Some(owner) = &self.owner {
            builder = builder.owner(owner.as_str());
        }

        builder.try_build(self.services.naming.as_ref()).await
    }

    /// Submits the sessions.
    ///
    /// The inputs are validated again first. Launching a non-inference
    /// session without any folder has to be confirmed. Every session is then
    /// created in parallel; each outcome is reported on its own and the
    /// dialog closes once they have all settled, unless every one of them
    /// failed.
    pub async fn submit(&mut self) -> Result<Submission, Error> {
        if self.closed {
            return Err(Error::Closed);
        }

        if self.step != Step::Review {
            return Err(Error::NotOnReview);
        }

        let requests = match self.build_requests().await {
            Ok(requests) => requests,
            Err(e) => {
                self.services
                    .notifier
                    .show("Cannot launch the session", Some(&e.to_string()), true);
                return Err(e.into());
            }
        };

        if self.mounts.is_empty()
            && self.session_type != SessionType::Inference
            && !self.no_folder_confirmed
        {
            debug!("no folder is mounted; asking for confirmation");
            return Ok(Submission::ConfirmNoFolder);
        }

        let outcomes = join_all(requests.into_iter().map(|request| {
            dispatch(
                self.services.broker.as_ref(),
                self.services.notifier.as_ref(),
                self.events.as_ref(),
                self.config.session(),
                request,
            )
        }))
        .await;

        if outcomes.iter().any(|outcome| outcome.result.is_ok()) {
            self.close();
        } else {
            warn!("every session creation failed; the dialog stays open for a retry");
        }

        Ok(Submission::Dispatched(outcomes))
    }
}

/// Creates one session and reports the outcome.
async fn dispatch(
    broker: &dyn ResourceBroker,
    notifier: &dyn NotificationService,
    events: Option<&Sender>,
    session: &Session,
    request: SessionRequest,
) -> Outcome {
    let id = next_request_id();
    let name = request.name().to_string();

    send_event!(
        events,
        Event::SessionCreateRequested {
            id,
            name: name.clone(),
        }
    );

    let result = broker
        .create_session(
            request.image(),
            &name,
            &request,
            session.timeout_ms(),
            request.architecture(),
        )
        .await;

    match &result {
        Ok(created) => {
            info!("session `{name}` created ({})", created.session_id);
            send_event!(
                events,
                Event::SessionCreated {
                    id,
                    session_id: created.session_id.clone(),
                    created: created.created,
                }
            );

            let message = if created.created {
                format!("Session `{name}` is being created")
            } else {
                format!("Session `{name}` is already running")
            };
            notifier.show(&message, None, false);
        }
        Err(e) => {
            warn!("failed to create session `{name}`: {e}");
            send_event!(
                events,
                Event::SessionCreateFailed {
                    id,
                    message: e.to_string(),
                }
            );
            notifier.show(
                &format!("Failed to create session `{name}`"),
                Some(&e.to_string()),
                true,
            );
        }
    }

    Outcome { name, result }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::resource::Bound;
    use crate::service::broker::memory::Broker;
    use crate::service::notify::Recorder;

    fn capacity(cpu: f64) -> Capacity {
        Capacity::builder()
            .slots(IndexMap::from([
                (String::from("cpu"), Bound::Finite(cpu)),
                (String::from("mem"), Bound::Finite(16.0)),
            ]))
            .build()
    }

    fn broker() -> Arc<Broker> {
        Arc::new(
            Broker::new(Policy::default())
                .with_scaling_group("default", capacity(8.0))
                .with_scaling_group("small", capacity(2.0))
                .with_presets(vec![
                    Preset::builder().name("small").cpu(2.0).mem(4.0).build(),
                ]),
        )
    }

    async fn open(broker: Arc<Broker>, config: Config) -> Wizard {
        let services = Services {
            broker: broker.clone(),
            notifier: Arc::new(Recorder::default()),
            naming: broker,
        };

        Wizard::open(services, config, "default", None).await.unwrap()
    }

    fn cpu_max(wizard: &Wizard) -> f64 {
        wizard.allocation().range(Dimension::Cpu).unwrap().max()
    }

    #[test]
    fn step_names() {
        assert_eq!(Step::Environment.name(), "environment");
        assert_eq!(Step::Review.name(), "review");
    }

    #[tokio::test]
    async fn switching_groups_during_a_refresh_keeps_the_current_group() {
        let broker = broker();
        let mut wizard = open(broker.clone(), Config::default()).await;

        let slot = wizard.resource_slot();
        let guard = slot.try_acquire().unwrap();

        assert_eq!(wizard.select_scaling_group("small").await, Err(Error::Busy));
        assert_eq!(wizard.scaling_group(), "default");
        assert_eq!(cpu_max(&wizard), 8.0);
        assert_eq!(broker.scaling_group().await, None);

        drop(guard);
        wizard.select_scaling_group("small").await.unwrap();
        assert_eq!(wizard.scaling_group(), "small");
        assert_eq!(cpu_max(&wizard), 2.0);
    }

    #[tokio::test]
    async fn snapshots_of_another_group_are_ignored() {
        let broker = broker();
        let mut wizard = open(broker.clone(), Config::default()).await;

        let stale = refresh::fetch(broker.as_ref(), "small", &Slot::default(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(!wizard.apply_snapshot(stale));
        assert_eq!(cpu_max(&wizard), 8.0);

        let current = refresh::fetch(broker.as_ref(), "default", &Slot::default(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(wizard.apply_snapshot(current));
    }

    #[tokio::test]
    async fn dropped_refreshes_report_false() {
        let mut wizard = open(broker(), Config::default()).await;

        let slot = wizard.resource_slot();
        let _guard = slot.try_acquire().unwrap();
        assert_eq!(wizard.refresh_resources().await, Ok(false));
    }

    #[tokio::test]
    async fn presets_only_refuses_manual_edits() {
        let config = Config::builder()
            .session(
                Session::builder()
                    .allow_custom_resource_allocation(false)
                    .build(),
            )
            .build();
        let mut wizard = open(broker(), config).await;

        assert!(wizard.allocation().is_presets_only());
        assert_eq!(wizard.set_value(Dimension::Cpu, 4.0), None);
        assert_eq!(wizard.allocation().value(Dimension::Cpu), Some(1.0));

        assert!(wizard.apply_preset("small"));
        assert_eq!(wizard.allocation().value(Dimension::Cpu), Some(2.0));
        assert_eq!(wizard.allocation().value(Dimension::Memory), Some(4.0));
    }

    #[tokio::test]
    async fn closed_wizards_refuse_to_move() {
        let mut wizard = open(broker(), Config::default()).await;
        wizard.close();

        assert_eq!(wizard.next().await, Err(Error::Closed));
        assert_eq!(wizard.submit().await, Err(Error::Closed));
        assert_eq!(wizard.step(), Step::Environment);
    }
}
