use anyhow::Result;
use clap::Parser;
use smile_core::{ExpressionNet, FaceFinder, SmilePipeline};
use smile_hw::Camera;
use tracing_subscriber::EnvFilter;

mod config;
mod controller;
mod shell;
mod store;
mod weights;

use config::{Cli, Config};
use controller::{ControlEvent, Controller};
use store::SqliteSlotStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli);
    tracing::info!(camera = %cfg.camera_device, "smiled starting");

    // Model weights resolve (or fail) before polling can ever begin. A
    // failure is not fatal: the mirror runs inert with a visible message.
    let pipeline = match weights::ensure_weights(&cfg.model_dir).await {
        Ok(()) => match load_pipeline(&cfg) {
            Ok(p) => Some(p),
            Err(err) => {
                tracing::error!(error = %err, "model load failed, running without detection");
                None
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "weight fetch failed, running without detection");
            None
        }
    };

    let feed = match Camera::open(&cfg.camera_device)
        .and_then(|camera| camera.spawn_feed(cfg.warmup_frames))
    {
        Ok(feed) => Some(feed),
        Err(err) => {
            tracing::warn!(error = %err, "camera unavailable");
            None
        }
    };

    let audio = match smile_hw::audio::spawn_player() {
        Ok(handle) => Some(handle),
        Err(err) => {
            // No audio device just means a mute mirror.
            tracing::warn!(error = %err, "audio unavailable");
            None
        }
    };

    let store = SqliteSlotStore::open(&cfg.db_path)?;

    let controller = Controller::new(cfg, feed, pipeline, audio, store);
    let tx = controller.sender();
    shell::spawn_input(tx.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(ControlEvent::Shutdown).await;
        }
    });

    controller.run().await;
    tracing::info!("smiled shutting down");
    Ok(())
}

fn load_pipeline(cfg: &Config) -> Result<SmilePipeline> {
    let finder = FaceFinder::load(&cfg.ultraface_model_path())?;
    let net = ExpressionNet::load(&cfg.ferplus_model_path())?;
    Ok(SmilePipeline::new(finder, net))
}
