//! zentinel_watch - Follow the ZentinelOS push stream from a terminal.
//!
//! Attaches one or both stream consumers to the backend:
//! 1. `detections`: reconciled detection list, one fallback to the alternate port
//! 2. `dashboard`: event and telemetry feeds, reconnecting every 2s on close
//! 3. `both`: two independent sockets, the way the operator dashboard runs
//!
//! Periodically logs (or prints as JSON) the derived view until Ctrl-C.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::json;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use zentinel_telemetry::config::WatchConfig;
use zentinel_telemetry::{
    ClientHandle, DashboardView, DetectionView, FallbackPolicy, LiveClient, ReconnectPolicy,
    Subscription,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Detections,
    Dashboard,
    Both,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Follow the ZentinelOS live telemetry stream")]
struct Args {
    /// Which stream consumers to attach.
    #[arg(long, value_enum, env = "ZENTINEL_WATCH_MODE", default_value = "both")]
    mode: Mode,

    /// Seconds between summary reports.
    #[arg(long, env = "ZENTINEL_REPORT_SECS", default_value_t = 5)]
    report_secs: u64,

    /// Print reports as JSON lines on stdout instead of logging them.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = WatchConfig::load()?;

    let stream_url = cfg.stream_url()?;
    log::info!("zentinel_watch starting");
    log::info!(
        "  API base: {}",
        if cfg.api_base.is_cross_origin() {
            cfg.api_base.api_url("/")
        } else {
            "same-origin".to_string()
        }
    );
    log::info!("  Stream: {}", stream_url);
    log::info!("  Mode: {:?}", args.mode);

    let mut detections: Option<ClientHandle<DetectionView>> = None;
    let mut dashboard: Option<ClientHandle<DashboardView>> = None;

    if matches!(args.mode, Mode::Detections | Mode::Both) {
        let policy = FallbackPolicy::with_delay(
            stream_url.clone(),
            cfg.fallback_url()?,
            cfg.stream.fallback_delay,
        );
        let sub = Subscription::new(policy, DetectionView::default());
        detections = Some(LiveClient::spawn(sub)?);
    }
    if matches!(args.mode, Mode::Dashboard | Mode::Both) {
        let policy = ReconnectPolicy::with_delay(stream_url.clone(), cfg.stream.reconnect_delay);
        let view = DashboardView::with_caps(cfg.feeds.max_events, cfg.feeds.max_telemetry);
        dashboard = Some(LiveClient::spawn(Subscription::new(policy, view))?);
    }

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("error setting Ctrl-C handler")?;

    let interval = Duration::from_secs(args.report_secs.max(1));
    loop {
        match rx.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                report(detections.as_ref(), dashboard.as_ref(), args.json)?;
            }
        }
    }

    log::info!("shutdown signal received, closing streams...");
    if let Some(mut handle) = detections.take() {
        handle.shutdown();
    }
    if let Some(mut handle) = dashboard.take() {
        handle.shutdown();
    }
    Ok(())
}

fn report(
    detections: Option<&ClientHandle<DetectionView>>,
    dashboard: Option<&ClientHandle<DashboardView>>,
    as_json: bool,
) -> Result<()> {
    if let Some(handle) = detections {
        let (summary, latest) = handle.read(|view| {
            (
                view.summary(),
                view.latest_detection().map(|d| (d.id, d.label.clone())),
            )
        });
        if as_json {
            let line = json!({
                "stream": "detections",
                "active": summary.active,
                "locked": summary.locked,
                "total_detections": summary.total_detections,
                "confidence_pct": summary.confidence_pct,
                "people": summary.objects.people,
                "vehicles": summary.objects.vehicles,
                "boats": summary.objects.boats,
                "latest_id": latest.as_ref().map(|(id, _)| *id),
            });
            println!("{}", serde_json::to_string(&line)?);
        } else {
            log::info!(
                "detections: active={} locked={} total={} conf={}% people={} vehicles={} boats={} latest={}",
                summary.active,
                summary.locked,
                summary.total_detections,
                summary.confidence_pct,
                summary.objects.people,
                summary.objects.vehicles,
                summary.objects.boats,
                latest
                    .map(|(id, label)| format!("#{} {}", id, label))
                    .unwrap_or_else(|| "none".to_string())
            );
        }
    }

    if let Some(handle) = dashboard {
        let (events, alerts, telemetry, boxes, tracks, last_title) = handle.read(|view| {
            (
                view.events().len(),
                view.alerts().len(),
                view.telemetry().len(),
                view.telemetry_boxes().len(),
                view.tracks().len(),
                view.events().latest().map(|e| e.title.clone()),
            )
        });
        if as_json {
            let line = json!({
                "stream": "dashboard",
                "events": events,
                "alerts": alerts,
                "telemetry": telemetry,
                "telemetry_boxes": boxes,
                "tracks": tracks,
                "last_event": last_title,
            });
            println!("{}", serde_json::to_string(&line)?);
        } else {
            log::info!(
                "dashboard: events={} alerts={} telemetry={} boxes={} tracks={} last={}",
                events,
                alerts,
                telemetry,
                boxes,
                tracks,
                last_title.unwrap_or_else(|| "none".to_string())
            );
        }
    }
    Ok(())
}
