//! Walks a launch dialog through a scenario against an in-memory broker.
//!
//! You can run this command with the following command:
//!
//! `cargo run --bin launch -- demos/scenarios/gpu.yaml`
//!
//! The session requests are printed as JSON before they are submitted,
//! followed by the outcome of every creation call.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use chrono::TimeDelta;
use chrono::Utc;
use clap::Parser;
use indexmap::IndexMap;
use launchpad::Config;
use launchpad::Wizard;
use launchpad::engine::allocation::Cluster;
use launchpad::engine::allocation::Preset;
use launchpad::engine::editor::env::EnvRow;
use launchpad::engine::editor::ports::PortRow;
use launchpad::engine::image::Image;
use launchpad::engine::mount::Folder;
use launchpad::engine::request::SessionType;
use launchpad::engine::resource::AcceleratorKind;
use launchpad::engine::resource::Capacity;
use launchpad::engine::resource::Dimension;
use launchpad::engine::resource::Policy;
use launchpad::engine::service::Refresher;
use launchpad::engine::service::broker::memory::Broker;
use launchpad::engine::service::notify::Log;
use launchpad::engine::wizard::Services;
use launchpad::engine::wizard::Step;
use launchpad::engine::wizard::Submission;
use launchpad::events::Event;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Debug, Parser)]
#[allow(missing_docs)]
pub struct Args {
    /// The scenario to walk through (YAML).
    scenario: PathBuf,

    /// Additional configuration files, merged in order.
    #[arg(short, long)]
    config: Vec<PathBuf>,

    /// Launch without any folder mounted without asking.
    #[arg(short, long)]
    yes: bool,
}

/// The session inputs of a scenario.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SessionInputs {
    /// The session type.
    #[serde(default, rename = "type")]
    session_type: SessionType,

    /// The session name.
    #[serde(default)]
    name: String,

    /// The startup command.
    #[serde(default)]
    startup_command: String,

    /// How long from now a batch session starts.
    starts_in_secs: Option<i64>,

    /// The access key of the owner.
    owner: Option<String>,
}

/// A folder to mount.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Mount {
    /// The folder name.
    folder: String,

    /// The alias of the folder.
    alias: Option<String>,
}

/// The resource inputs of a scenario.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct Resources {
    /// The preset to apply first.
    preset: Option<String>,

    /// Values keyed by slot name.
    #[serde(default)]
    values: IndexMap<String, f64>,

    /// The number of sessions.
    sessions: Option<u32>,

    /// The cluster topology.
    cluster: Option<Cluster>,
}

/// A launch scenario.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct Scenario {
    /// The scaling group to launch on.
    #[serde(default = "default_scaling_group")]
    scaling_group: String,

    /// The resource policy of the user.
    #[serde(default)]
    policy: Policy,

    /// The capacity of each scaling group.
    capacity: IndexMap<String, Capacity>,

    /// The folders the user can mount.
    #[serde(default)]
    folders: Vec<String>,

    /// The resource presets.
    #[serde(default)]
    presets: Vec<Preset>,

    /// The names of sessions already running.
    #[serde(default)]
    running: Vec<String>,

    /// The image to launch.
    image: Image,

    /// The session inputs.
    #[serde(default)]
    session: SessionInputs,

    /// The folders to mount.
    #[serde(default)]
    mounts: Vec<Mount>,

    /// The environment variables.
    #[serde(default)]
    environ: IndexMap<String, String>,

    /// The ports to pre-open.
    #[serde(default)]
    ports: Vec<u16>,

    /// The resource inputs.
    #[serde(default)]
    resources: Resources,
}

/// The scaling group used when a scenario names none.
fn default_scaling_group() -> String {
    String::from("default")
}

impl Scenario {
    /// Reads a scenario from a file.
    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario `{}`", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing scenario `{}`", path.display()))
    }

    /// Builds the broker serving the scenario.
    fn broker(&self) -> Broker {
        self.capacity
            .iter()
            .fold(Broker::new(self.policy.clone()), |broker, (name, capacity)| {
                broker.with_scaling_group(name.as_str(), capacity.clone())
            })
            .with_folders(self.folders.iter().map(Folder::new))
            .with_presets(self.presets.clone())
            .with_running(self.running.iter().cloned())
    }
}

/// Maps a slot name to its dimension.
fn dimension(slot: &str) -> Result<Dimension> {
    Ok(match slot {
        "cpu" => Dimension::Cpu,
        "mem" => Dimension::Memory,
        "shmem" => Dimension::SharedMemory,
        slot => Dimension::Accelerator(
            slot.parse::<AcceleratorKind>()
                .map_err(anyhow::Error::msg)?,
        ),
    })
}

/// Fills in the environment step.
fn fill_environment(wizard: &mut Wizard, scenario: &Scenario) -> Result<()> {
    wizard.set_image(scenario.image.clone());

    let session = &scenario.session;
    wizard.set_session_type(session.session_type);
    wizard.set_name(session.name.as_str());
    wizard.set_startup_command(session.startup_command.as_str());
    wizard.set_starts_at(
        session
            .starts_in_secs
            .map(|secs| Utc::now() + TimeDelta::seconds(secs)),
    );
    wizard.set_owner(session.owner.clone());

    let environ = wizard.environ_mut();
    for (index, (name, value)) in scenario.environ.iter().enumerate() {
        environ.set_row(index, EnvRow::new(name.as_str(), value.as_str()));
    }
    environ.commit().context("committing environment variables")?;

    let ports = wizard.ports_mut();
    for (index, port) in scenario.ports.iter().enumerate() {
        ports.set_row(index, PortRow::new(port.to_string()));
    }
    ports.commit().context("committing ports")?;

    Ok(())
}

/// Fills in the mounts step.
fn fill_mounts(wizard: &mut Wizard, scenario: &Scenario) -> Result<()> {
    let mounts = wizard.mounts_mut();
    for mount in &scenario.mounts {
        mounts
            .select(&mount.folder)
            .with_context(|| format!("selecting folder `{}`", mount.folder))?;

        if let Some(alias) = &mount.alias {
            mounts
                .set_alias(&mount.folder, alias)
                .with_context(|| format!("aliasing folder `{}`", mount.folder))?;
        }
    }

    Ok(())
}

/// Fills in the resources step.
fn fill_resources(wizard: &mut Wizard, resources: &Resources) -> Result<()> {
    if let Some(preset) = &resources.preset {
        if !wizard.apply_preset(preset) {
            bail!("preset `{preset}` does not exist or does not fit");
        }
    }

    for (slot, value) in &resources.values {
        let dimension = dimension(slot)?;
        match wizard.set_value(dimension, *value) {
            Some(stored) if stored != *value => {
                warn!("`{slot}` was adjusted from {value} to {stored}")
            }
            Some(_) => {}
            None => warn!("`{slot}` cannot be set right now"),
        }
    }

    if let Some(cluster) = resources.cluster {
        wizard.set_cluster_mode(cluster.mode);
        let size = wizard.set_cluster_size(cluster.size);
        if size != cluster.size {
            warn!("the cluster size was adjusted from {} to {size}", cluster.size);
        }
    }

    if let Some(sessions) = resources.sessions {
        wizard.set_value(Dimension::Sessions, f64::from(sessions));
    }

    Ok(())
}

/// Starting point for the launch.
async fn run(args: Args) -> Result<()> {
    let config = Config::load_with_paths(&args.config).context("loading configuration")?;
    config.validate().context("validating configuration")?;

    let scenario = Scenario::read(&args.scenario)?;
    let broker = Arc::new(scenario.broker());

    let (events, mut receiver) = broadcast::channel::<Event>(64);
    let monitor = tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => debug!(?event),
                Err(RecvError::Lagged(skipped)) => warn!("skipped {skipped} event(s)"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let services = Services {
        broker: broker.clone(),
        notifier: Arc::new(Log),
        naming: broker.clone(),
    };

    let interval = config.refresh().interval();
    let mut wizard = Wizard::open(
        services,
        config,
        scenario.scaling_group.as_str(),
        Some(events.clone()),
    )
    .await
    .context("opening the launch dialog")?;

    let refresher = Refresher::spawn(
        broker.clone(),
        scenario.scaling_group.as_str(),
        wizard.resource_slot(),
        interval,
        Some(events.clone()),
    );

    fill_environment(&mut wizard, &scenario)?;

    while wizard.step() != Step::Review {
        match wizard.step() {
            Step::Mounts => fill_mounts(&mut wizard, &scenario)?,
            Step::Resources => fill_resources(&mut wizard, &scenario.resources)?,
            Step::Environment | Step::Review => {}
        }

        let step = wizard
            .next()
            .await
            .with_context(|| format!("leaving the {} step", wizard.step().name()))?;
        info!("entered the {} step", step.name());
    }

    let requests = wizard
        .build_requests()
        .await
        .context("building session requests")?;
    println!("{}", serde_json::to_string_pretty(&requests)?);

    let mut submission = wizard.submit().await.context("submitting")?;
    if submission == Submission::ConfirmNoFolder {
        if !args.yes {
            bail!("no folder is mounted; pass `--yes` to launch anyway");
        }

        wizard.confirm_no_folder();
        submission = wizard.submit().await.context("submitting")?;
    }

    if let Submission::Dispatched(outcomes) = submission {
        let outcomes = outcomes
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(created) => serde_json::json!({
                    "name": outcome.name,
                    "session_id": created.session_id,
                    "created": created.created,
                }),
                Err(e) => serde_json::json!({
                    "name": outcome.name,
                    "error": e.to_string(),
                }),
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    }

    if let Some(snapshot) = refresher.latest() {
        debug!(
            "last refreshed capacity of `{}`: {:?}",
            scenario.scaling_group, snapshot.capacity
        );
    }

    refresher.stop().await;
    drop(wizard);
    drop(events);
    monitor.await.context("joining the event monitor")?;

    Ok(())
}

/// The main function.
fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building the runtime")?
        .block_on(run(args))
}
