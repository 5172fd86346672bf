use std::path::PathBuf;

use clap::{Parser, Subcommand};

use permgate_core::appop::parse_mode;
use permgate_core::{AccessUri, AppId, Decision, UserId};

#[derive(Debug, Parser)]
#[command(name = "permgate", version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Package snapshot (TOML), overrides `packages.snapshot_path`.
    #[arg(short, long, global = true)]
    pub packages: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the decision for a subject and object uri.
    Get {
        subject: AccessUri,
        object: AccessUri,
    },
    /// Store a decision; modes are names or numbers.
    Set {
        subject: AccessUri,
        object: AccessUri,
        #[arg(value_parser = parse_mode_arg)]
        mode: Decision,
    },
    RemovePackageModes {
        package_name: String,
        #[arg(long, default_value_t = 0)]
        user: UserId,
    },
    AddUser {
        user_id: UserId,
    },
    RemoveUser {
        user_id: UserId,
    },
    /// The snapshot must already list the package.
    PackageAdded {
        package_name: String,
    },
    /// The snapshot must no longer list the package.
    PackageRemoved {
        package_name: String,
        #[arg(long)]
        app_id: AppId,
    },
    PackageInstalled {
        package_name: String,
        #[arg(long)]
        user: UserId,
    },
    PackageUninstalled {
        package_name: String,
        #[arg(long)]
        user: UserId,
    },
    VolumeMounted {
        #[arg(long)]
        volume_uuid: Option<String>,
        #[arg(long)]
        system_updated: bool,
    },
    /// Print every explicit decision as JSON.
    Dump,
}

fn parse_mode_arg(value: &str) -> Result<Decision, String> {
    parse_mode(value).ok_or_else(|| format!("unknown mode '{value}'"))
}
