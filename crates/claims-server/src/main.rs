//! Chunk claims host runner
//!
//! This binary:
//! 1. Loads configuration (`CLAIMS_CONFIG`, `CLAIMS_DATA_DIR`, `CLAIMS_AUTOSAVE_SECS`)
//! 2. Opens the LMDB store and migrates the legacy schema once
//! 3. Loads every region into the claim service
//! 4. Runs the auto-save timer and the console until quit or Ctrl-C
//!
//! Commands:
//! - `s` or `stats` - Region, cell, member and owner counts
//! - `save` - Save every region now
//! - `r` or `reload` - Reload regions from the store
//! - `l` or `list [owner]` - List regions
//! - `i` or `info <world> <x> <z>` - Region at a block position
//! - `f` or `flags` - Flag registry
//! - `q` or `quit` - Save, flush and exit
//! - `help` - Show help

mod autosave;
mod commands;
mod config;

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;

use claims_core::{ClaimService, CoordinateProvider, GridCoordinates, flag};
use claims_store::{ClaimDb, Migration, SaveMode, SaveQueue};
use crossbeam_channel::Sender;
use tracing::{error, info, warn};

use crate::autosave::AutoSave;
use crate::commands::{Command, parse_command};

fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("claims_server=info".parse()?)
                .add_directive("claims_core=info".parse()?)
                .add_directive("claims_store=info".parse()?),
        )
        .init();

    info!("Starting claims server");

    let config = config::load()?;
    info!("Data directory: {}", config.data_dir.display());

    let db = Arc::new(ClaimDb::open(&config.data_dir, config.map_size_bytes())?);
    match db.migrate_legacy(config.flag_defaults()?)? {
        Migration::Migrated(report) => info!(
            "Migrated {} legacy cells into {} regions",
            report.legacy_cells, report.regions
        ),
        Migration::AlreadyMigrated | Migration::NoLegacyData => {}
    }

    let queue = Arc::new(SaveQueue::spawn(
        Arc::clone(&db),
        SaveMode::from_async(config.async_saves),
    )?);
    let service = Arc::new(ClaimService::new(config.clone(), queue.clone())?);
    service.load_from(db.as_ref())?;

    let autosave = AutoSave::spawn(Arc::clone(&service), config.auto_save_interval())?;
    if autosave.is_none() {
        warn!("Auto-save disabled");
    }

    // Set up command input channel
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded::<Command>();
    {
        let tx = cmd_tx.clone();
        ctrlc::set_handler(move || {
            let _ = tx.send(Command::Quit);
        })?;
    }
    thread::spawn(move || input_thread(&cmd_tx));

    print_prompt();
    let coords = GridCoordinates::default();

    for cmd in cmd_rx {
        match cmd {
            Command::Stats => {
                let stats = service.stats();
                info!(
                    "{} regions, {} cells, {} members, {} owners",
                    stats.regions, stats.cells, stats.members, stats.owners
                );
            }
            Command::Save => {
                let saved = service.save_all();
                info!("Queued {saved} region saves");
            }
            Command::Reload => {
                match service.reload(db.as_ref()) {
                    Ok(report) => info!("Reloaded {} regions", report.regions),
                    Err(e) => error!("Reload failed: {e}"),
                }
            }
            Command::List(owner) => {
                let regions = match &owner {
                    Some(name) => service.regions_by_owner_name(name),
                    None => service.all_regions(),
                };
                info!("Regions ({}):", regions.len());
                for region in regions {
                    info!(
                        "  {} {} - {} in {}, {} cells, {} members",
                        region.id(),
                        region.display_name(),
                        region.owner().name,
                        region.world(),
                        region.cell_count(),
                        region.member_count()
                    );
                }
            }
            Command::Info { world, x, z } => {
                let cell = coords.cell_at(&world, x, z);
                match service.region_at(&cell) {
                    Some(region) => {
                        info!(
                            "{cell} belongs to {} {} (owner {})",
                            region.id(),
                            region.display_name(),
                            region.owner().name
                        );
                        for member in region.members() {
                            info!("  {} ({})", member.player.name, member.level);
                        }
                    }
                    None => info!("{cell} is unclaimed"),
                }
            }
            Command::Flags => {
                for entry in flag::registry() {
                    info!(
                        "  {:<22} default {:<5} {}",
                        entry.key, entry.default, entry.description
                    );
                }
            }
            Command::Quit => {
                info!("Shutting down...");
                break;
            }
            Command::Help => {
                info!("Commands:");
                info!("  s, stats                - Claim statistics");
                info!("  save                    - Save every region now");
                info!("  r, reload               - Reload regions from the store");
                info!("  l, list [owner]         - List regions");
                info!("  i, info <world> <x> <z> - Region at a block position");
                info!("  f, flags                - Flag registry");
                info!("  q, quit                 - Save and quit");
            }
            Command::Unknown(s) => {
                if !s.is_empty() {
                    info!("Unknown command: '{s}'. Type 'help' for commands.");
                }
            }
        }
        print_prompt();
    }

    // Cleanup
    if let Some(autosave) = autosave {
        autosave.stop();
    }
    let saved = service.save_all();
    if let Err(e) = queue.flush() {
        error!("Failed to flush saves: {e}");
    }
    queue.shutdown();
    info!("Saved {saved} regions, bye");

    Ok(())
}

fn input_thread(tx: &Sender<Command>) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let cmd = parse_command(&line);
        let is_quit = matches!(cmd, Command::Quit);
        if tx.send(cmd).is_err() || is_quit {
            return;
        }
    }
    // stdin closed
    let _ = tx.send(Command::Quit);
}

#[allow(clippy::print_stdout)]
fn print_prompt() {
    print!("> ");
    io::stdout().flush().ok();
}
