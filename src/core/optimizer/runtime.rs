//! Tokio runtime driving the engine's periodic activities.
//!
//! Four tasks with independent cadences (sampler, rules, governor, effects)
//! share nothing but the [`Engine`] tables. Every published tick is also
//! forwarded on a watch channel for the presentation layer.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, MissedTickBehavior};

use super::engine::Engine;
use super::types::SnapshotSet;

/// Cadence of each background task
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    pub sample: Duration,
    pub rules: Duration,
    pub governor: Duration,
    pub effects: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            sample: Duration::from_secs(3),
            rules: Duration::from_secs(5),
            governor: Duration::from_secs(5),
            effects: Duration::from_secs(1),
        }
    }
}

pub struct EngineRuntime {
    /// Latest published snapshot set
    pub snapshot_rx: watch::Receiver<Arc<SnapshotSet>>,

    shutdown_tx: broadcast::Sender<()>,

    runtime: tokio::runtime::Runtime,
}

impl EngineRuntime {
    /// Build the runtime and spawn every task
    pub fn start(engine: Arc<Engine>, cadence: Cadence) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .thread_name("warden-worker")
            .build()?;

        let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        runtime.spawn(sampler_task(
            Arc::clone(&engine),
            cadence.sample,
            snapshot_tx,
            shutdown_tx.subscribe(),
        ));
        runtime.spawn(rules_task(
            Arc::clone(&engine),
            cadence.rules,
            shutdown_tx.subscribe(),
        ));
        runtime.spawn(governor_task(
            Arc::clone(&engine),
            cadence.governor,
            shutdown_tx.subscribe(),
        ));
        runtime.spawn(effects_task(engine, cadence.effects, shutdown_tx.subscribe()));

        log::debug!(
            "Engine runtime started (sample {:?}, rules {:?}, governor {:?})",
            cadence.sample,
            cadence.rules,
            cadence.governor
        );

        Ok(Self {
            snapshot_rx,
            shutdown_tx,
            runtime,
        })
    }

    /// Signal every task to stop and wait for the workers
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        self.runtime.shutdown_timeout(Duration::from_secs(2));
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period.max(Duration::from_millis(100)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn sampler_task(
    engine: Arc<Engine>,
    period: Duration,
    snapshot_tx: watch::Sender<Arc<SnapshotSet>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = ticker(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let engine = Arc::clone(&engine);
                // sysinfo refresh is blocking
                let published = tokio::task::spawn_blocking(move || engine.sample_tick()).await;
                match published {
                    Ok(Ok(Some(set))) => {
                        // no receivers is fine
                        let _ = snapshot_tx.send(set);
                    }
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => log::warn!("Sampling failed: {}", e),
                    Err(e) => log::error!("Sampler task panicked: {}", e),
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn rules_task(engine: Arc<Engine>, period: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = ticker(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let engine = Arc::clone(&engine);
                if let Err(e) = tokio::task::spawn_blocking(move || engine.rules_tick()).await {
                    log::error!("Rules task panicked: {}", e);
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn governor_task(
    engine: Arc<Engine>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = ticker(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !engine.governor_enabled() {
                    continue;
                }
                let engine = Arc::clone(&engine);
                if let Err(e) = tokio::task::spawn_blocking(move || engine.governor_tick()).await {
                    log::error!("Governor task panicked: {}", e);
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn effects_task(
    engine: Arc<Engine>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = ticker(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let engine = Arc::clone(&engine);
                if let Err(e) = tokio::task::spawn_blocking(move || engine.effects_tick()).await {
                    log::error!("Effects task panicked: {}", e);
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
