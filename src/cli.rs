// SPDX-License-Identifier: MPL-2.0

//! Command-line subcommand implementations
//!
//! Each subcommand loads a [`crate::config::ConfigSource`] the same way
//! the running service would, so `discover`/`status` reflect the same
//! configuration a `start` would use.

use crate::config::ConfigSource;
use crate::controller::FtsController;
use crate::storage;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn load_config(path: Option<&Path>) -> Result<crate::config::Config, Box<dyn std::error::Error>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(storage::default_config_path);
    let path = path.exists().then_some(path);
    let source = ConfigSource::load(path.as_deref())?;
    Ok(source.snapshot())
}

pub async fn discover(config_path: Option<&Path>, deadline_secs: u64) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let controller = FtsController::new();
    controller.start(config).await?;
    let candidates = controller.discover(Duration::from_secs(deadline_secs)).await?;
    controller.stop().await?;

    if candidates.is_empty() {
        println!("no cameras found");
        return Ok(());
    }
    for candidate in candidates {
        match candidate {
            crate::discovery::CandidateCamera::Local(device) => {
                println!(
                    "local  index={} driver={} card={} resolution={:?} fps={:?} reachable={}",
                    device.index, device.driver, device.card, device.resolution, device.fps, device.reachable
                );
            }
            crate::discovery::CandidateCamera::Network(camera) => {
                println!(
                    "network {} onvif={} resolution={:?} fps={:?} reachable={}",
                    camera.address, camera.onvif, camera.resolution, camera.fps, camera.reachable
                );
            }
        }
    }
    Ok(())
}

pub async fn enroll(
    config_path: Option<&Path>,
    employee_id: &str,
    image_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let image_bytes = std::fs::read(image_path)?;

    let controller = FtsController::new();
    controller.start(config).await?;
    let result = controller.enroll(employee_id, &image_bytes).await;
    controller.stop().await?;

    result?;
    println!("enrolled '{employee_id}'");
    Ok(())
}

pub async fn start(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let controller = FtsController::new();
    controller.start(config).await?;
    info!("service started; press Ctrl+C to stop");

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let shutdown_signal = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        shutdown_signal.notify_one();
    })?;

    shutdown.notified().await;
    println!("shutting down...");
    controller.stop().await?;
    Ok(())
}

pub async fn status(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    println!("cameras configured: {}", config.cameras.len());
    for camera in &config.cameras {
        println!("  - {} enabled={} tripwires={}", camera.id, camera.enabled, camera.tripwires.len());
    }

    let identity_index = crate::identity::IdentityIndex::load(&config.identity_index_path, config.embedding_dimension)?;
    println!("identities enrolled: {}", identity_index.len());
    Ok(())
}
