// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use cone_pilot::cli::Cli;
use cone_pilot::config::Config;
use cone_pilot::control::ConePilot;
use cone_pilot::frame_region::SharedFrameRegion;
use cone_pilot::pipeline::FrameLoop;
use cone_pilot::reference::ReferenceSteering;
use cone_pilot::run_flag::RunFlag;
use cone_pilot::telemetry::{FrameRecorder, TelemetrySink};
use cone_pilot::transport::{listen_ground_steering, Od4Session};
use cone_pilot::vision::{CaptureFeeder, OpenCvAnalyzer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries telemetry only.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cone_pilot=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let (width, height) = (cli.width as usize, cli.height as usize);
    config.validate_frame_size(width, height)?;

    let region = SharedFrameRegion::new(cli.name.clone(), width, height)?;
    let feeder = CaptureFeeder::attach(&cli.name, region.clone())?;
    info!(
        "Attached to frame region '{}' ({} bytes)",
        region.name(),
        region.size()
    );

    let reference = ReferenceSteering::new();
    let mut session = Od4Session::join(cli.cid, config.transport.port).await?;
    listen_ground_steering(&mut session, reference.clone());

    let running = RunFlag::new();

    let session_task = tokio::spawn(session.run(running.clone()));
    let feeder_thread = feeder.spawn(running.clone())?;

    let interrupt = running.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
        }
        interrupt.stop();
    });

    let telemetry = TelemetrySink::new(config.telemetry.label.clone(), std::io::stdout());
    let analyzer = OpenCvAnalyzer::new(config.detection.clone(), cli.verbose);
    let mut control = FrameLoop::new(
        ConePilot::new(&config),
        analyzer,
        region.reader(),
        reference.reader(),
        telemetry,
        running.clone(),
    );
    if let Some(path) = &cli.record {
        control = control.with_recorder(FrameRecorder::create(path)?);
        info!("Recording frame reports to {}", path.display());
    }

    let outcome = tokio::task::spawn_blocking(move || control.run())
        .await
        .context("control loop panicked");

    running.stop();
    region.close();

    match session_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("OD4 session ended with error: {:#}", e),
        Err(e) => warn!("OD4 session task failed: {}", e),
    }
    match feeder_thread.join() {
        Ok(Ok(published)) => info!("Frame producer published {} frame(s)", published),
        Ok(Err(e)) => warn!("Frame producer ended with error: {:#}", e),
        Err(_) => warn!("Frame producer thread panicked"),
    }

    match outcome? {
        Ok(summary) => {
            info!(
                "Processed {} frame(s) in {:.1}s",
                summary.total_frames, summary.elapsed_secs
            );
            Ok(())
        }
        Err(e) => {
            error!("Control loop failed: {:#}", e);
            Err(e)
        }
    }
}
