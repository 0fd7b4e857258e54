//! Wellsync CLI - capture field production data offline and sync it later
//!
//! Every command works against the on-device store; only `sync` talks to the
//! server.

mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::add::run_add;
use crate::commands::common::{resolve_db_path, ClearFlags};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::conflicts::{run_conflicts, run_resolve};
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::events::run_events;
use crate::commands::export::run_export;
use crate::commands::list::run_list;
use crate::commands::queue::run_queue;
use crate::commands::show::run_show;
use crate::commands::sync::{run_sync, run_sync_retry};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "wellsync=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let profile = cli.profile.as_deref();

    match cli.command {
        Some(Commands::Add { well, date, fields }) => {
            run_add(&well, date, &fields, &db_path).await?;
        }
        Some(Commands::List {
            status,
            limit,
            json,
        }) => run_list(status.as_deref(), limit, json, &db_path).await?,
        Some(Commands::Show { id, json }) => run_show(&id, json, &db_path).await?,
        Some(Commands::Edit {
            id,
            well,
            date,
            fields,
            clear_pressure,
            clear_temperature,
            clear_checklist,
            clear_location,
        }) => {
            let clear = ClearFlags {
                pressure: clear_pressure,
                temperature: clear_temperature,
                checklist: clear_checklist,
                location: clear_location,
            };
            run_edit(&id, well, date, &fields, &clear, &db_path).await?;
        }
        Some(Commands::Delete { id }) => run_delete(&id, &db_path).await?,
        Some(Commands::Queue { json }) => run_queue(json, &db_path).await?,
        Some(Commands::Sync {
            command,
            offline,
            json,
        }) => match command {
            Some(SyncCommands::Retry { id }) => run_sync_retry(&id, &db_path).await?,
            None => run_sync(offline, json, profile, &db_path).await?,
        },
        Some(Commands::Conflicts { json }) => run_conflicts(json, &db_path).await?,
        Some(Commands::Resolve { id, strategy, by }) => {
            run_resolve(&id, strategy.into(), by.as_deref(), &db_path).await?;
        }
        Some(Commands::Events {
            entity,
            limit,
            json,
        }) => run_events(entity.as_deref(), limit, json, &db_path).await?,
        Some(Commands::Export { output }) => run_export(output.as_deref(), &db_path).await?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        Some(Commands::Config { command }) => run_config(command, profile)?,
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
