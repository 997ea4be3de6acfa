//! Vidshelf - local video library server CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use vidshelf_core::colored_logger::{init_component_logger, Component};
use vidshelf_core::config::Config;
use vidshelf_db::{Catalog, CatalogError, CatalogStore, LastPath, LastPathStore};
use vidshelf_processing::{scanner, FfmpegTools};
use vidshelf_web::AppState;

#[derive(Parser)]
#[command(name = "vidshelf")]
#[command(about = "Local video library with thumbnails, subtitles and streaming")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the library web API
    Serve {
        /// Listen port
        #[arg(short, long)]
        port: Option<u16>,

        /// Listen address
        #[arg(long)]
        host: Option<String>,

        /// Directory holding the catalog and static files
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Scan a folder and add new videos to the catalog
    Scan {
        /// Folder to scan recursively
        path: PathBuf,

        /// Directory holding the catalog
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Check external dependencies (ffmpeg, ffprobe)
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let component = match cli.command {
        Commands::Serve { .. } => Component::Server,
        Commands::Scan { .. } => Component::Scan,
        Commands::Check => Component::Check,
    };
    init_component_logger(component, cli.verbose)?;

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Serve {
            port,
            host,
            data_dir,
        } => {
            cmd_serve(apply_overrides(config, data_dir.as_deref(), port, host))?;
        }
        Commands::Scan { path, data_dir } => {
            cmd_scan(apply_overrides(config, data_dir.as_deref(), None, None), &path)?;
        }
        Commands::Check => {
            cmd_check(&config);
        }
    }

    Ok(())
}

/// CLI flags win over file values
fn apply_overrides(
    mut config: Config,
    data_dir: Option<&Path>,
    port: Option<u16>,
    host: Option<String>,
) -> Config {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }
    match data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    }
}

fn tools(config: &Config) -> FfmpegTools {
    FfmpegTools::new(config.tools.dir.as_deref(), config.tool_timeout())
}

#[tokio::main]
async fn cmd_serve(config: Config) -> Result<()> {
    let addr = config.listen_addr()?;
    let tools = tools(&config);

    let status = {
        let probe_tools = tools.clone();
        tokio::task::spawn_blocking(move || probe_tools.check()).await?
    };
    if !status.all_ok() {
        warn!(
            "ffmpeg: {}, ffprobe: {}; thumbnails and metadata will be unavailable",
            if status.ffmpeg { "ok" } else { "missing" },
            if status.ffprobe { "ok" } else { "missing" },
        );
    }

    info!("catalog: {:?}", config.library.data_file);
    info!("static files: {:?}", config.library.static_dir);
    info!("web interface: http://{}", addr);

    let state = AppState::new(config.server_options(), Arc::new(tools));
    vidshelf_web::serve(state, addr, shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down..."),
        Err(e) => warn!("failed to listen for Ctrl+C: {}", e),
    }
}

fn cmd_scan(config: Config, path: &Path) -> Result<()> {
    if !path.is_dir() {
        anyhow::bail!("not a folder: {:?}", path);
    }

    let catalog = Catalog::open(&config.library.data_file);
    let known: HashSet<String> = catalog
        .load_all()
        .with_context(|| format!("failed to read catalog {:?}", catalog.path()))?
        .into_iter()
        .map(|item| item.path)
        .collect();

    let result = scanner::scan_new_videos(path, &known, &tools(&config));
    let found = result.items.len();
    let (added, total) = catalog.modify(|items| {
        let added = scanner::reconcile(items, result.items);
        Ok::<_, CatalogError>((added, items.len()))
    })?;

    LastPathStore::new(&config.library.last_path_file).save(&LastPath {
        path: path.to_string_lossy().into_owned(),
    })?;

    println!("scanned {:?} in {:.1}s", path, result.elapsed_secs);
    println!("  new videos found: {}", found);
    println!("  added:            {}", added.len());
    println!("  catalog size:     {}", total);

    Ok(())
}

fn cmd_check(config: &Config) {
    let tools = tools(config);
    let status = tools.check();

    println!("checking dependencies...\n");
    println!(
        "  ffmpeg:  {} ({})",
        if status.ffmpeg { "OK" } else { "NOT FOUND" },
        tools.ffmpeg_path().display()
    );
    println!(
        "  ffprobe: {} ({})",
        if status.ffprobe { "OK" } else { "NOT FOUND" },
        tools.ffprobe_path().display()
    );
    println!();

    if status.all_ok() {
        println!("all checks passed!");
    } else {
        println!("WARNING: ffmpeg and ffprobe are needed for thumbnails and video metadata.");
        println!(
            "Place them next to the vidshelf executable, set [tools] dir, or add them to PATH."
        );
        println!("Download: https://ffmpeg.org/download.html");
    }
}
