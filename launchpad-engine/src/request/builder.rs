//! A builder for [`SessionRequest`]s.

use chrono::DateTime;
use chrono::Utc;
use indexmap::IndexMap;
use launchpad_config::Session;
use tracing::debug;

use crate::allocation::Allocation;
use crate::editor::EnvVar;
use crate::image::Image;
use crate::mount::Selection;
use crate::request::SessionRequest;
use crate::request::SessionType;
use crate::request::ValidationError;
use crate::resource::Dimension;
use crate::resource::Infeasible;
use crate::service::NamingService;
use crate::service::naming::Alphanumeric;
use crate::service::naming::Generator as _;
use crate::service::naming::is_valid_name;

/// The number of random characters in a generated session name.
const GENERATED_NAME_LENGTH: usize = 8;

/// The number of random characters suffixed to each of several sessions.
const SUFFIX_LENGTH: usize = 4;

/// The number of times a generated name is retried when it is taken.
const NAME_ATTEMPTS: usize = 5;

/// A [`Result`](std::result::Result) with a [`ValidationError`].
pub type Result<T> = std::result::Result<T, ValidationError>;

/// A builder for [`SessionRequest`]s.
#[derive(Debug, Default)]
pub struct Builder<'a> {
    /// The chosen resources.
    allocation: Option<&'a Allocation>,

    /// The chosen folders.
    mounts: Option<&'a Selection>,

    /// The committed environment variables.
    environ: &'a [EnvVar],

    /// The committed ports.
    ports: &'a [u16],

    /// The chosen image.
    image: Option<&'a Image>,

    /// The session type.
    session_type: SessionType,

    /// An optional session name.
    name: Option<String>,

    /// An optional startup command.
    startup_command: Option<String>,

    /// An optional scheduled start time.
    starts_at: Option<DateTime<Utc>>,

    /// An optional owner access key.
    owner: Option<String>,

    /// The session defaults.
    session: Option<&'a Session>,
}

impl<'a> Builder<'a> {
    /// Sets the chosen resources.
    pub fn allocation(mut self, allocation: &'a Allocation) -> Self {
        self.allocation = Some(allocation);
        self
    }

    /// Sets the chosen folders.
    pub fn mounts(mut self, mounts: &'a Selection) -> Self {
        self.mounts = Some(mounts);
        self
    }

    /// Sets the environment variables.
    pub fn environ(mut self, environ: &'a [EnvVar]) -> Self {
        self.environ = environ;
        self
    }

    /// Sets the ports to pre-open.
    pub fn ports(mut self, ports: &'a [u16]) -> Self {
        self.ports = ports;
        self
    }

    /// Sets the image.
    pub fn image(mut self, image: &'a Image) -> Self {
        self.image = Some(image);
        self
    }

    /// Sets the session type.
    pub fn session_type(mut self, session_type: SessionType) -> Self {
        self.session_type = session_type;
        self
    }

    /// Sets the session name.
    ///
    /// # Notes
    ///
    /// A blank name is replaced by a generated one.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the startup command (only used by batch sessions).
    pub fn startup_command<S: Into<String>>(mut self, command: S) -> Self {
        self.startup_command = Some(command.into());
        self
    }

    /// Sets the scheduled start time (only used by batch sessions).
    pub fn starts_at(mut self, starts_at: DateTime<Utc>) -> Self {
        self.starts_at = Some(starts_at);
        self
    }

    /// Creates the session for another user.
    pub fn owner<S: Into<String>>(mut self, access_key: S) -> Self {
        self.owner = Some(access_key.into());
        self
    }

    /// Sets the session defaults.
    pub fn session(mut self, session: &'a Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Validates the inputs and builds one request per session to launch.
    ///
    /// Checks run in order and the first failure is returned:
    ///
    /// 1. the session name (generated when blank) is well formed and not in
    ///    use,
    /// 2. an image and a tag are selected,
    /// 3. batch sessions have a startup command and a start time in the
    ///    future,
    /// 4. every resource dimension is feasible,
    /// 5. shared memory does not exceed memory (lowered silently if it does),
    /// 6. no two folders mount at the same path.
    ///
    /// When several sessions are launched, each gets the name with a random
    /// suffix.
    pub async fn try_build(self, naming: &dyn NamingService) -> Result<Vec<SessionRequest>> {
        let allocation = self
            .allocation
            .ok_or(ValidationError::Missing("allocation"))?;
        let mounts = self.mounts.ok_or(ValidationError::Missing("mounts"))?;
        let defaults = Session::default();
        let session = self.session.unwrap_or(&defaults);

        let name = match self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                if !is_valid_name(name) {
                    return Err(ValidationError::InvalidName(name.to_string()));
                }

                if naming.exists(name).await.map_err(ValidationError::NameCheck)? {
                    return Err(ValidationError::DuplicateName(name.to_string()));
                }

                name.to_string()
            }
            None => {
                let generator = Alphanumeric::new(session.name_prefix(), GENERATED_NAME_LENGTH);
                unique_name(&generator, naming, &[]).await?
            }
        };

        let image = self
            .image
            .filter(|image| image.is_selected())
            .ok_or(ValidationError::ImageNotSelected)?;

        let (startup_command, starts_at) = match self.session_type {
            SessionType::Batch => {
                let command = self
                    .startup_command
                    .filter(|command| !command.trim().is_empty())
                    .ok_or(ValidationError::MissingStartupCommand)?;

                if let Some(starts_at) = self.starts_at {
                    if starts_at <= Utc::now() {
                        return Err(ValidationError::StartInPast(starts_at));
                    }
                }

                (Some(command), self.starts_at)
            }
            SessionType::Interactive | SessionType::Inference => (None, None),
        };

        let infeasible = allocation.infeasible();
        if !infeasible.is_empty() {
            return Err(Infeasible(infeasible).into());
        }

        let mut resources = allocation.resources();
        let mem = resources
            .get(Dimension::Memory.slot())
            .copied()
            .unwrap_or_default();
        if let Some(shmem) = resources
            .get_mut(Dimension::SharedMemory.slot())
            .filter(|shmem| **shmem > mem)
        {
            debug!("lowering shared memory from {shmem} GiB to {mem} GiB");
            *shmem = mem;
        }

        mounts.check_collisions()?;

        let count = allocation.sessions().max(1) as usize;
        let names = if count == 1 {
            vec![name]
        } else {
            let generator = Alphanumeric::new(&name, SUFFIX_LENGTH);
            let mut names = Vec::with_capacity(count);

            for _ in 0..count {
                let name = unique_name(&generator, naming, &names).await?;
                names.push(name);
            }

            names
        };

        let cluster = allocation.cluster();
        let architecture = image
            .architecture()
            .unwrap_or(session.architecture())
            .to_string();
        let environ: IndexMap<String, String> = self
            .environ
            .iter()
            .map(|var| (var.name.clone(), var.value.clone()))
            .collect();

        debug!(
            "built {count} request(s) for `{image}`",
            image = image.kernel_ref()
        );

        Ok(names
            .into_iter()
            .map(|name| SessionRequest {
                image: image.kernel_ref(),
                architecture: architecture.clone(),
                session_type: self.session_type,
                resources: resources.clone(),
                cluster_mode: cluster.mode,
                cluster_size: cluster.size,
                mounts: mounts.mounts(),
                mount_map: mounts.mount_map(),
                environ: environ.clone(),
                preopen_ports: self.ports.to_vec(),
                name,
                startup_command: startup_command.clone(),
                starts_at,
                owner_access_key: self.owner.clone(),
            })
            .collect())
    }
}

/// Generates a name that is neither running nor in `taken`.
///
/// A generated name that is not well formed (e.g., from a prefix with spaces)
/// is rejected rather than retried.
async fn unique_name(
    generator: &Alphanumeric,
    naming: &dyn NamingService,
    taken: &[String],
) -> Result<String> {
    let mut name = String::new();

    for _ in 0..NAME_ATTEMPTS {
        name = generator.generate();

        if !is_valid_name(&name) {
            return Err(ValidationError::InvalidName(name));
        }

        if !taken.contains(&name)
            && !naming
                .exists(&name)
                .await
                .map_err(ValidationError::NameCheck)?
        {
            return Ok(name);
        }

        debug!("generated name `{name}` is taken; retrying");
    }

    Err(ValidationError::DuplicateName(name))
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use indexmap::IndexMap;
    use launchpad_config::Ceilings;

    use super::*;
    use crate::allocation::ClusterMode;
    use crate::mount::Folder;
    use crate::resource::Bound;
    use crate::resource::Capacity;
    use crate::resource::ImageLimit;
    use crate::resource::Limits;
    use crate::resource::Policy;
    use crate::service::broker::memory::Broker;

    fn allocation(max_containers: u32) -> Allocation {
        let capacity = Capacity::builder()
            .slots(IndexMap::from([
                (String::from("cpu"), Bound::Finite(8.0)),
                (String::from("mem"), Bound::Finite(32.0)),
            ]))
            .build();
        let policy = Policy::builder()
            .max_containers_per_session(max_containers)
            .build();

        Allocation::new(Limits::resolve(
            &IndexMap::new(),
            &policy,
            &capacity,
            &Ceilings::default(),
            &Session::default(),
        ))
    }

    fn image() -> Image {
        Image::builder()
            .name("cr.backend.ai/stable/python")
            .tag("3.9-ubuntu20.04")
            .build()
    }

    fn mounts() -> Selection {
        let mut mounts = Selection::new("/home/work");
        mounts.set_available(vec![Folder::new("data")]);
        mounts.select("data").unwrap();
        mounts
    }

    #[tokio::test]
    async fn placeholder_image_is_rejected() {
        let allocation = allocation(1);
        let mounts = mounts();
        let image = Image::default();

        let err = SessionRequest::builder()
            .allocation(&allocation)
            .mounts(&mounts)
            .image(&image)
            .name("my-session")
            .try_build(&Broker::default())
            .await
            .unwrap_err();

        assert_eq!(err, ValidationError::ImageNotSelected);
    }

    #[tokio::test]
    async fn missing_allocation_is_reported() {
        let err = SessionRequest::builder()
            .try_build(&Broker::default())
            .await
            .unwrap_err();

        assert_eq!(err, ValidationError::Missing("allocation"));
    }

    #[tokio::test]
    async fn aggregates_are_value_times_cluster_size() {
        let mut allocation = allocation(4);
        allocation.set_value(Dimension::Cpu, 2.0);
        allocation.set_value(Dimension::Memory, 2.5);
        allocation.set_value(Dimension::SharedMemory, 0.3125);
        allocation.set_cluster_size(3);

        let mounts = mounts();
        let image = image();
        let requests = SessionRequest::builder()
            .allocation(&allocation)
            .mounts(&mounts)
            .image(&image)
            .name("my-session")
            .try_build(&Broker::default())
            .await
            .unwrap();

        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.name(), "my-session");
        assert_eq!(request.cluster_size(), 3);
        assert_eq!(request.aggregate("cpu"), Some(6.0));
        assert_eq!(request.aggregate("mem"), Some(7.5));
        assert_eq!(request.aggregate("shmem"), Some(0.9375));
        assert_eq!(request.architecture(), "x86_64");
        assert_eq!(request.mounts(), ["data"]);
    }

    #[tokio::test]
    async fn name_checks_come_first() {
        let allocation = allocation(1);
        let mounts = mounts();
        let broker = Broker::default().with_running(["taken"]);

        let err = SessionRequest::builder()
            .allocation(&allocation)
            .mounts(&mounts)
            .name("taken")
            .try_build(&broker)
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateName(String::from("taken")));

        let err = SessionRequest::builder()
            .allocation(&allocation)
            .mounts(&mounts)
            .name("bad name!")
            .try_build(&broker)
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidName(String::from("bad name!")));
    }

    #[tokio::test]
    async fn blank_names_are_generated() {
        let allocation = allocation(1);
        let mounts = mounts();
        let image = image();
        let session = Session::builder().name_prefix("nb").build();

        let requests = SessionRequest::builder()
            .allocation(&allocation)
            .mounts(&mounts)
            .image(&image)
            .name("  ")
            .session(&session)
            .try_build(&Broker::default())
            .await
            .unwrap();

        assert!(requests[0].name().starts_with("nb-"));
        assert!(is_valid_name(requests[0].name()));
    }

    #[tokio::test]
    async fn malformed_generated_names_are_rejected() {
        let allocation = allocation(1);
        let mounts = mounts();
        let image = image();
        let broker = Broker::default();

        for prefix in ["my sess", "-x"] {
            let session = Session::builder().name_prefix(prefix).build();
            let err = SessionRequest::builder()
                .allocation(&allocation)
                .mounts(&mounts)
                .image(&image)
                .session(&session)
                .try_build(&broker)
                .await
                .unwrap_err();

            match err {
                ValidationError::InvalidName(name) => {
                    assert!(name.starts_with(prefix), "{name}")
                }
                err => panic!("unexpected error: {err}"),
            }
        }
    }

    #[tokio::test]
    async fn batch_sessions_need_a_command_and_a_future_start() {
        let allocation = allocation(1);
        let mounts = mounts();
        let image = image();
        let builder = || {
            SessionRequest::builder()
                .allocation(&allocation)
                .mounts(&mounts)
                .image(&image)
                .name("batch-job")
                .session_type(SessionType::Batch)
        };

        let err = builder().try_build(&Broker::default()).await.unwrap_err();
        assert_eq!(err, ValidationError::MissingStartupCommand);

        let past = Utc::now() - TimeDelta::hours(1);
        let err = builder()
            .startup_command("python train.py")
            .starts_at(past)
            .try_build(&Broker::default())
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::StartInPast(past));

        let future = Utc::now() + TimeDelta::hours(1);
        let requests = builder()
            .startup_command("python train.py")
            .starts_at(future)
            .try_build(&Broker::default())
            .await
            .unwrap();
        assert_eq!(requests[0].startup_command(), Some("python train.py"));
        assert_eq!(requests[0].starts_at(), Some(future));
    }

    #[tokio::test]
    async fn infeasible_resources_are_rejected() {
        let policy = Policy::builder()
            .concurrency_max(Bound::Finite(1.0))
            .concurrency_used(1)
            .build();
        let allocation = Allocation::new(Limits::resolve(
            &IndexMap::new(),
            &policy,
            &Capacity::default(),
            &Ceilings::default(),
            &Session::default(),
        ));
        let mounts = mounts();
        let image = image();

        let err = SessionRequest::builder()
            .allocation(&allocation)
            .mounts(&mounts)
            .image(&image)
            .name("my-session")
            .try_build(&Broker::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ValidationError::Infeasible(Infeasible(vec![Dimension::Sessions]))
        );
    }

    #[tokio::test]
    async fn several_sessions_get_distinct_suffixes() {
        let mut allocation = allocation(1);
        allocation.set_value(Dimension::Sessions, 3.0);
        let mounts = mounts();
        let image = image();

        let requests = SessionRequest::builder()
            .allocation(&allocation)
            .mounts(&mounts)
            .image(&image)
            .name("sweep")
            .try_build(&Broker::default())
            .await
            .unwrap();

        assert_eq!(requests.len(), 3);
        for request in &requests {
            assert!(request.name().starts_with("sweep-"));
            assert_eq!(request.name().len(), "sweep-".len() + SUFFIX_LENGTH);
            assert!(is_valid_name(request.name()));
        }
        assert_ne!(requests[0].name(), requests[1].name());
        assert_ne!(requests[1].name(), requests[2].name());
    }

    #[tokio::test]
    async fn payload_uses_the_wire_names() {
        let mut allocation = allocation(1);
        allocation.set_cluster_mode(ClusterMode::MultiNode);
        let mounts = mounts();
        let image = image();
        let environ = [EnvVar::new("SEED", "42")];

        let requests = SessionRequest::builder()
            .allocation(&allocation)
            .mounts(&mounts)
            .image(&image)
            .environ(&environ)
            .ports(&[8080])
            .name("my-session")
            .owner("AKIAEXAMPLE")
            .try_build(&Broker::default())
            .await
            .unwrap();

        let payload = serde_json::to_value(&requests[0]).unwrap();
        assert_eq!(payload["type"], "interactive");
        assert_eq!(payload["cluster_mode"], "multi-node");
        assert_eq!(payload["environ"]["SEED"], "42");
        assert_eq!(payload["preopen_ports"][0], 8080);
        assert_eq!(payload["owner_access_key"], "AKIAEXAMPLE");
        assert!(payload.get("startup_command").is_none());
    }
}
