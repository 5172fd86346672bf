use clap::Parser;
use permgate_core::appop::mode_name;
use permgate_core::collection::IntSet;
use permgate_core::state::PackageStates;
use permgate_core::Decision;
use permgate_service::cli::{Cli, Command};
use permgate_service::config::{AppConfig, LogFormat};
use permgate_service::service::AccessService;
use permgate_service::snapshot::PackageSnapshot;
use permgate_storage::FileStateStore;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type Service = AccessService<FileStateStore>;

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    // Command output owns stdout.
    let registry = tracing_subscriber::registry().with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr);
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr);
            registry.with(fmt_layer).init();
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.packages {
        config.packages.snapshot_path = Some(path);
    }
    init_logging(&config);

    let snapshot = match &config.packages.snapshot_path {
        Some(path) => PackageSnapshot::load(path)?,
        None => {
            tracing::warn!("no package snapshot configured, starting without packages");
            PackageSnapshot::default()
        }
    };
    let store = FileStateStore::open(&config.storage.state_dir)?;
    let service = AccessService::new(store, config.to_app_op_defaults())?;

    run(&service, &snapshot, cli.command)
}

// The snapshot describes the packages and users after the event, so the
// service is first initialized with the view from before it.
fn run(
    service: &Service,
    snapshot: &PackageSnapshot,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Get { subject, object } => {
            service.initialize_from_snapshot(snapshot)?;
            let decision = service.get_decision(&subject, &object)?;
            println!("{}", describe(decision));
        }
        Command::Set {
            subject,
            object,
            mode,
        } => {
            service.initialize_from_snapshot(snapshot)?;
            service.set_decision(&subject, &object, mode)?;
            println!("{subject} {object} = {}", describe(mode));
        }
        Command::RemovePackageModes { package_name, user } => {
            service.initialize_from_snapshot(snapshot)?;
            if !service.remove_app_op_modes(&package_name, user)? {
                println!("{package_name} has no explicit modes for user {user}");
            }
        }
        Command::AddUser { user_id } => {
            let mut user_ids = snapshot.user_id_set();
            user_ids.shift_remove(&user_id);
            initialize_with(service, snapshot, &user_ids, snapshot.package_states())?;
            service.on_user_added(user_id)?;
        }
        Command::RemoveUser { user_id } => {
            let mut user_ids = snapshot.user_id_set();
            user_ids.insert(user_id);
            initialize_with(service, snapshot, &user_ids, snapshot.package_states())?;
            service.on_user_removed(user_id)?;
        }
        Command::PackageAdded { package_name } => {
            let before = snapshot.package_states_without(&package_name);
            initialize_with(service, snapshot, &snapshot.user_id_set(), before)?;
            service.on_package_added(
                snapshot.package_states(),
                snapshot.disabled_system_package_states(),
                &package_name,
            )?;
        }
        Command::PackageRemoved {
            package_name,
            app_id,
        } => {
            let before = snapshot.package_states_with(&package_name, app_id);
            initialize_with(service, snapshot, &snapshot.user_id_set(), before)?;
            service.on_package_removed(
                snapshot.package_states(),
                snapshot.disabled_system_package_states(),
                &package_name,
                app_id,
            )?;
        }
        Command::PackageInstalled { package_name, user } => {
            service.initialize_from_snapshot(snapshot)?;
            service.on_package_installed(
                snapshot.package_states(),
                snapshot.disabled_system_package_states(),
                &package_name,
                user,
            )?;
        }
        Command::PackageUninstalled { package_name, user } => {
            let app_id = snapshot
                .app_id_of(&package_name)
                .ok_or_else(|| format!("package {package_name} is not in the package snapshot"))?;
            service.initialize_from_snapshot(snapshot)?;
            service.on_package_uninstalled(
                snapshot.package_states(),
                snapshot.disabled_system_package_states(),
                &package_name,
                app_id,
                user,
            )?;
        }
        Command::VolumeMounted {
            volume_uuid,
            system_updated,
        } => {
            service.initialize_from_snapshot(snapshot)?;
            service.on_storage_volume_mounted(
                snapshot.package_states(),
                snapshot.disabled_system_package_states(),
                volume_uuid.as_deref(),
                system_updated,
            )?;
        }
        Command::Dump => {
            service.initialize_from_snapshot(snapshot)?;
            let records = service.decisions()?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}

fn initialize_with(
    service: &Service,
    snapshot: &PackageSnapshot,
    user_ids: &IntSet,
    package_states: PackageStates,
) -> Result<(), Box<dyn std::error::Error>> {
    service.initialize(
        user_ids,
        package_states,
        snapshot.disabled_system_package_states(),
        snapshot.permission_allowlist.clone(),
    )?;
    Ok(())
}

fn describe(decision: Decision) -> String {
    match mode_name(decision) {
        Some(name) => format!("{name} ({decision})"),
        None => decision.to_string(),
    }
}
