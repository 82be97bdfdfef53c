//! vsphere-inventory: command line front end.
//!
//! Path subcommands are pure and print their result on stdout.
//! `wait-customization` and `query-events` replay a recorded event log
//! through an in-memory event source.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use vsphere_inventory::config::Config;
use vsphere_inventory::event::{
    CompletionWaiter, Event, ManagedObjectReference, MemoryEventSource, WaiterError,
    WaiterOptions, parse_event_log, select_events_for_reference,
};
use vsphere_inventory::folder::{FolderType, RootPathParticle, normalize_folder_path};
use vsphere_inventory::logging;
use vsphere_inventory::paths::InventoryPaths;
use vsphere_inventory::version::VSphereVersion;

/// vSphere inventory path tools
#[derive(Parser, Debug)]
#[command(name = "vsphere-inventory", version, about = "vSphere inventory path tools")]
struct Args {
    /// Config file (defaults to ~/.config/vsphere-inventory/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at info level on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize a relative folder path
    Normalize { path: String },

    /// Split an inventory path into datacenter and relative parts
    Split {
        #[arg(long = "type", value_parser = parse_particle)]
        folder_type: RootPathParticle,
        inventory_path: String,
    },

    /// Re-root an inventory path under another folder type's root
    MoveRoot {
        #[arg(long, value_parser = parse_particle)]
        from: RootPathParticle,
        #[arg(long, value_parser = parse_particle)]
        to: RootPathParticle,
        inventory_path: String,
        /// Relative path to append under the new root
        relative: Option<String>,
    },

    /// Folder type for a childType pair, e.g. `Folder VirtualMachine`
    ChildType { child_types: Vec<String> },

    /// Compare two vSphere versions of the same product
    CompareVersion {
        #[arg(long, default_value = "VMware vCenter Server")]
        product: String,
        /// First version as VERSION:BUILD, e.g. 6.7.0:8170161
        a: String,
        /// Second version as VERSION:BUILD
        b: String,
    },

    /// Wait for customization of a VM against a recorded event log
    WaitCustomization {
        /// Managed object reference, e.g. VirtualMachine:vm-42
        #[arg(long)]
        vm: ManagedObjectReference,
        /// JSON-lines file with one event per line
        #[arg(long)]
        events: PathBuf,
        /// Overrides customization.timeout_secs from the config file
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Print the recorded events for an entity, optionally of given types
    QueryEvents {
        /// Managed object reference, e.g. VirtualMachine:vm-42
        #[arg(long)]
        entity: ManagedObjectReference,
        /// JSON-lines file with one event per line
        #[arg(long)]
        events: PathBuf,
        /// Event type to select; repeat for several
        #[arg(long = "type")]
        event_types: Vec<String>,
    },

    /// Write a config file with the default settings
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_particle(s: &str) -> Result<RootPathParticle, String> {
    let ft: FolderType = s.parse().map_err(|e| format!("{e}"))?;
    RootPathParticle::try_from(ft).map_err(|e| format!("{e}"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init(args.verbose);

    match args.command {
        Command::Normalize { path } => {
            println!("{}", normalize_folder_path(&path));
        }
        Command::Split {
            folder_type,
            inventory_path,
        } => {
            let datacenter = folder_type
                .split_datacenter(&inventory_path)
                .context("splitting datacenter")?;
            let relative = folder_type.split_relative(&inventory_path)?;
            let folder = folder_type.split_relative_folder(&inventory_path)?;
            println!("datacenter: {datacenter}");
            println!("relative:   {relative}");
            println!("folder:     {folder}");
        }
        Command::MoveRoot {
            from,
            to,
            inventory_path,
            relative,
        } => {
            let path = match relative {
                Some(relative) => from.path_from_new_root(&inventory_path, to, &relative)?,
                None => from.new_root_from_path(&inventory_path, to)?,
            };
            println!("{path}");
        }
        Command::ChildType { child_types } => {
            println!("{}", FolderType::from_child_types(&child_types)?);
        }
        Command::CompareVersion { product, a, b } => {
            let a = parse_version_arg(&product, &a)?;
            let b = parse_version_arg(&product, &b)?;
            let verdict = if a.newer(&b) {
                "newer"
            } else if a.older(&b) {
                "older"
            } else {
                "equal"
            };
            println!("{a} is {verdict} than {b}");
        }
        Command::WaitCustomization {
            vm,
            events,
            timeout_secs,
        } => {
            let config = Config::load(&config_path(args.config)?)?;
            let mut options = config.waiter_options();
            if let Some(secs) = timeout_secs {
                options.timeout = Duration::from_secs(secs);
            }

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to create Tokio runtime")?;
            let outcome = runtime.block_on(wait_customization(vm.clone(), &events, options))?;

            match outcome {
                Ok(()) => println!("customization of {vm} succeeded"),
                Err(WaiterError::Failed { message }) => {
                    bail!("customization of {vm} failed: {message}")
                }
                Err(e) => return Err(e).with_context(|| format!("waiting for {vm}")),
            }
        }
        Command::QueryEvents {
            entity,
            events,
            event_types,
        } => {
            let config = Config::load(&config_path(args.config)?)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to create Tokio runtime")?;
            let selected = runtime.block_on(query_events(
                &entity,
                &events,
                &event_types,
                config.api_timeout(),
            ))?;
            for event in selected {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Command::InitConfig { force } => {
            let config_path = config_path(args.config)?;
            if config_path.exists() && !force {
                bail!(
                    "{} already exists; use --force to overwrite",
                    config_path.display()
                );
            }
            Config::default().write(&config_path)?;
            println!("wrote {}", config_path.display());
        }
    }

    Ok(())
}

/// `--config`, or the default location under the user's config directory.
fn config_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => Ok(InventoryPaths::resolve()
            .context("HOME is not set; pass --config")?
            .config_file()),
    }
}

fn parse_version_arg(product: &str, arg: &str) -> Result<VSphereVersion> {
    let Some((version, build)) = arg.split_once(':') else {
        bail!("expected VERSION:BUILD, got {arg:?}");
    };
    Ok(VSphereVersion::parse(product, version, build)?)
}

/// Start the waiter, then replay the recorded events. Subscribing first is
/// what a real caller does before triggering the customization task.
async fn wait_customization(
    vm: ManagedObjectReference,
    events_file: &Path,
    options: WaiterOptions,
) -> Result<Result<(), WaiterError>> {
    let recorded = load_events(events_file).await?;
    info!(count = recorded.len(), file = %events_file.display(), "loaded recorded events");

    let source = Arc::new(MemoryEventSource::sized_for(recorded.len()));
    let waiter = CompletionWaiter::customization(source.clone(), vm, options).await;

    let replay = tokio::spawn({
        let source = source.clone();
        async move {
            for event in recorded {
                source.publish(event);
                tokio::task::yield_now().await;
            }
        }
    });

    let outcome = waiter.wait().await;
    replay.await.context("event replay task failed")?;
    debug!(remaining = source.active_subscriptions(), "waiter finished");
    Ok(outcome)
}

/// Load a recorded log into a source and select from it, bounded by the
/// API timeout.
async fn query_events(
    entity: &ManagedObjectReference,
    events_file: &Path,
    event_types: &[String],
    api_timeout: Duration,
) -> Result<Vec<Event>> {
    let recorded = load_events(events_file).await?;
    let source = MemoryEventSource::sized_for(recorded.len());
    for event in recorded {
        source.publish(event);
    }
    let types: Vec<&str> = event_types.iter().map(String::as_str).collect();
    select_events_for_reference(&source, entity, &types, api_timeout)
        .await
        .with_context(|| format!("querying events for {entity}"))
}

async fn load_events(path: &Path) -> Result<Vec<Event>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_event_log(&content).with_context(|| format!("parsing {}", path.display()))
}
