//! Drive one `MirrorSource` the way a compositing host would: a tick loop,
//! a render loop at the output frame rate, and periodic status reports.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use vrmirror_capture::platform::Platform;
use vrmirror_capture::{CaptureRegistry, Dispatch, FrameOutcome, MirrorSource, NativePlatform, TickOutcome};

use crate::config::HostConfig;
use crate::host::HeadlessHost;

pub async fn run(config: HostConfig) -> Result<()> {
    let platform = NativePlatform::new(HeadlessHost::new()?);
    let registry = CaptureRegistry::new(platform, Dispatch::current());
    let source = Arc::new(MirrorSource::create(&registry, config.source_name.clone(), config.settings.clone()));

    let outcome = {
        let source = Arc::clone(&source);
        blocking(move || source.show()).await?
    };
    info!("[{}] Shown ({:?})", config.source_name, outcome);

    let (stop_tx, stop_rx) = watch::channel(false);
    let tick = tokio::spawn(tick_loop(Arc::clone(&source), config.tick_period(), stop_rx.clone()));
    let render = tokio::spawn(render_loop(
        Arc::clone(&source),
        config.frame_period(),
        config.status_interval(),
        stop_rx,
    ));

    match config.run_duration() {
        Some(limit) => tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Ctrl-C received, stopping"),
            _ = tokio::time::sleep(limit) => info!("Run duration {:?} elapsed, stopping", limit),
        },
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Ctrl-C received, stopping");
        }
    }

    let _ = stop_tx.send(true);
    if let Err(e) = tick.await {
        warn!("Tick loop ended abnormally: {e}");
    }
    if let Err(e) = render.await {
        warn!("Render loop ended abnormally: {e}");
    }

    // Teardown blocks on the admission gate.
    let teardown = registry.clone();
    blocking(move || {
        source.hide();
        drop(source);
        teardown.shutdown();
    })
    .await?;

    let stats = registry.platform().host().stats();
    info!(
        "Host totals: {} imports, {} destroys, {} draws",
        stats.imports, stats.destroys, stats.draws
    );
    Ok(())
}

async fn tick_loop<P: Platform>(
    source: Arc<MirrorSource<P>>,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {
                // A quit releases the session, which blocks on the admission gate.
                let worker = Arc::clone(&source);
                match blocking(move || worker.tick(true)).await {
                    Ok(TickOutcome::QuitObserved) => {
                        info!("[{}] Runtime quit observed; will retry while visible", source.session().name());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("[{}] Tick failed: {e:#}", source.session().name()),
                }
            }
        }
    }
}

async fn render_loop<P: Platform>(
    source: Arc<MirrorSource<P>>,
    period: Duration,
    status_every: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut frame = interval(period);
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status = interval(status_every);
    let mut rate = RateCounter::new();

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = frame.tick() => {
                if let FrameOutcome::Drawn { copied } = source.render() {
                    rate.tick(copied);
                }
            }
            _ = status.tick() => {
                let session = source.session();
                info!(
                    "[{}] {} | {}×{} | {:.0} fps drawn, {:.0} fps copied | {} copies total",
                    session.name(),
                    source.status().label(),
                    source.width(),
                    source.height(),
                    rate.drawn_fps(),
                    rate.copied_fps(),
                    session.copies(),
                );
            }
        }
    }
}

/// Run a capture call that may wait on the admission gate off the async
/// workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.context("capture task panicked")
}

// ── RateCounter ───────────────────────────────────────────────────────────────

/// Draws and copies over the last second.
struct RateCounter {
    frames: VecDeque<(Instant, bool)>,
}

impl RateCounter {
    fn new() -> Self {
        Self { frames: VecDeque::with_capacity(256) }
    }

    fn tick(&mut self, copied: bool) {
        let now = Instant::now();
        self.frames.push_back((now, copied));
        while self.frames.front().map_or(false, |(t, _)| now - *t > Duration::from_secs(1)) {
            self.frames.pop_front();
        }
    }

    fn drawn_fps(&self) -> f32 {
        self.frames.len() as f32
    }

    fn copied_fps(&self) -> f32 {
        self.frames.iter().filter(|(_, copied)| *copied).count() as f32
    }
}
