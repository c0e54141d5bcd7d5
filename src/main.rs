extern crate log;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod geofile;
pub mod osm;
pub mod pota;
pub mod server;
use crate::cache::scheduler::{CacheSet, Refresher};
use crate::config::Config;
use crate::osm::download::OverpassSource;
use crate::pota::download::ParkCsvSource;
use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Cache and serve POTA park locations from the park registry and OpenStreetMap.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config_filepath: Option<PathBuf>,

    /// Address to listen on, overrides the config file.
    #[arg(short, long)]
    listen_address: Option<SocketAddr>,
}

async fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    let mut config = match &args.config_filepath {
        Some(filepath) => Config::from_file(filepath)?,
        None => Config::default(),
    };
    if let Some(listen_address) = args.listen_address {
        config.listen_address = listen_address;
    }
    log::debug!("{:?}", config);

    let client = fetch::build_client(&config.user_agent, config.request_timeout())
        .context("Building HTTP client")?;
    let caches = Arc::new(CacheSet::default());
    let refresher = Arc::new(Refresher::new(
        ParkCsvSource::new(client.clone(), config.csv_url.clone()),
        OverpassSource::new(
            client,
            config.overpass_url.clone(),
            config.overpass_query.clone(),
        ),
        Arc::clone(&caches),
    ));

    let listener = tokio::net::TcpListener::bind(config.listen_address)
        .await
        .with_context(|| format!("Binding to {}", config.listen_address))?;
    log::info!("Listening on {}", config.listen_address);

    let shutdown = CancellationToken::new();
    let jobs = Arc::clone(&refresher).spawn(config.refresh_intervals(), shutdown.clone());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                log::error!("Could not listen for shutdown signal: {}", err);
                return;
            }
            log::info!("Shutting down");
            shutdown.cancel();
        }
    });

    let served = server::serve(listener, Arc::clone(refresher.caches()), shutdown.clone()).await;
    shutdown.cancel();
    for job in jobs {
        if let Err(err) = job.await {
            log::error!("Refresh job ended abnormally: {}", err);
        }
    }
    served.context("Serving HTTP")
}

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main().await {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
