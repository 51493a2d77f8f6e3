//! # Role Wiring
//!
//! Builds each role from the [`Container`] and runs it until shutdown.
//!
//! ```text
//!   ingress   CSV ──► Pump ──► bus:flights
//!   indexer   bus:flights ──► Enricher ──► BulkCommitter ──► store
//!                                  └──────► bus:flights.enriched
//!   server    bus:flights.enriched ──► LiveFeed ──► Hub ──► /wsapi/ws
//!             store ◄── /api/flights
//!   all       everything above, one bus, one store, one HTTP port
//! ```
//!
//! A role that stops on its own fires the shared shutdown trigger, so the
//! rest of the process follows it down.

use crate::container::Container;
use crate::errors::RuntimeError;
use crate::http::{ops_router, serve};
use ac_01_ingress::{read_path, Pump, PumpReport};
use ac_02_indexer::{Enricher, FixedGeocoder, Geocoder, GoogleGeocoder, Indexer};
use ac_03_live_feed::{router as feed_router, FeedState, FlightSearch, Hub, LiveFeed};
use axum::Router;
use crash_telemetry::log_event;
use shared_bus::{shutdown_channel, ShutdownTrigger};
use shared_types::Readiness;
use std::fmt::Display;
use std::future::Future;
use std::io;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

/// How long `all` waits before the first publish. The in-process bus does
/// not hold messages for subscribers that have not arrived yet.
pub const INGRESS_START_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Replay the CSV, optionally overriding `ingress.rps`.
    Ingress { rps: Option<u32> },
    Indexer,
    Server,
    All { rps: Option<u32> },
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Ingress { .. } => "ingress",
            Role::Indexer => "indexer",
            Role::Server => "server",
            Role::All { .. } => "all",
        }
    }

    pub fn serves_http(&self) -> bool {
        !matches!(self, Role::Ingress { .. })
    }
}

/// One process: its connections plus the shutdown trigger every task watches.
pub struct NodeRuntime {
    container: Container,
    trigger: Arc<ShutdownTrigger>,
}

impl NodeRuntime {
    pub fn new(container: Container) -> Self {
        let (trigger, _signal) = shutdown_channel();
        Self {
            container,
            trigger: Arc::new(trigger),
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn readiness(&self) -> Arc<Readiness> {
        Arc::clone(&self.container.readiness)
    }

    /// Handed to the signal handler; firing it stops every role.
    pub fn shutdown_trigger(&self) -> Arc<ShutdownTrigger> {
        Arc::clone(&self.trigger)
    }

    pub async fn bind_http(&self) -> Result<TcpListener, RuntimeError> {
        let port = self.container.config.http.port;
        TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(|source| RuntimeError::Bind { port, source })
    }

    /// Run `role` until it finishes or shutdown fires. Roles that serve HTTP
    /// bind `http.port` unless a listener is passed in.
    pub async fn run(&self, role: Role, listener: Option<TcpListener>) -> Result<(), RuntimeError> {
        log_event!(info, role.name(), "Starting role");
        let listener = match (role.serves_http(), listener) {
            (false, _) => None,
            (true, Some(listener)) => Some(listener),
            (true, None) => Some(self.bind_http().await?),
        };

        let result = match (role, listener) {
            (Role::Ingress { rps }, _) => self.run_ingress(rps).await.map(|_| ()),
            (Role::Indexer, Some(listener)) => self.run_indexer(listener).await,
            (Role::Server, Some(listener)) => self.run_server(listener).await,
            (Role::All { rps }, Some(listener)) => self.run_all(listener, rps).await,
            (_, None) => Err(RuntimeError::Http(io::Error::other("no HTTP listener"))),
        };

        match &result {
            Ok(()) => log_event!(info, role.name(), "Role stopped"),
            Err(e) => {
                log_event!(error, role.name(), "Role failed", error = %e);
                self.trigger.fire();
            }
        }
        result
    }

    /// Read the CSV off the async threads, then pump it onto the bus.
    pub async fn run_ingress(&self, rps: Option<u32>) -> Result<PumpReport, RuntimeError> {
        let config = &self.container.config;
        let path = PathBuf::from(&config.ingress.csv_path);
        let file = tokio::task::spawn_blocking(move || read_path(&path)).await??;

        let rps = rps.unwrap_or(config.ingress.rps);
        let pump = Pump::new(Arc::clone(&self.container.bus), config.bus.topic.clone(), rps)?;
        log_event!(
            info,
            "ingress",
            "Replaying crashes",
            records = file.records.len(),
            rps = rps,
            topic = %config.bus.topic
        );

        let mut report = pump.run(file.records, self.trigger.signal()).await;
        report.skipped = file.skipped;
        log_event!(
            info,
            "ingress",
            "Replay finished",
            published = report.published,
            failed = report.failed,
            skipped = report.skipped,
            cancelled = report.cancelled
        );
        Ok(report)
    }

    async fn run_indexer(&self, listener: TcpListener) -> Result<(), RuntimeError> {
        let indexer = self.build_indexer()?;
        let http = self.spawn_http(listener, Router::new());
        self.container.readiness.mark_ready();

        let indexed = self.fatal_on_exit("indexer", indexer.run(self.trigger.signal())).await;
        let served = http.await?;

        let report = indexed?;
        served.map_err(RuntimeError::Http)?;
        log_event!(
            info,
            "indexer",
            "Indexing totals",
            committed = report.committed,
            batches = report.batches,
            item_failures = report.item_failures
        );
        Ok(())
    }

    async fn run_server(&self, listener: TcpListener) -> Result<(), RuntimeError> {
        let (hub, feed, app) = self.build_feed();
        let hub = tokio::spawn(hub.run(self.trigger.signal()));
        let http = self.spawn_http(listener, app);
        self.container.readiness.mark_ready();

        let forwarded = self.fatal_on_exit("server", feed.run(self.trigger.signal())).await;
        let served = http.await?;
        hub.await?;

        let forwarded = forwarded?;
        served.map_err(RuntimeError::Http)?;
        log_event!(info, "server", "Live feed totals", forwarded = forwarded);
        Ok(())
    }

    async fn run_all(&self, listener: TcpListener, rps: Option<u32>) -> Result<(), RuntimeError> {
        let indexer = self.build_indexer()?;
        let (hub, feed, app) = self.build_feed();
        let hub = tokio::spawn(hub.run(self.trigger.signal()));
        let http = self.spawn_http(listener, app);
        self.container.readiness.mark_ready();

        let ingress = async {
            let shutdown = self.trigger.signal();
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(PumpReport { cancelled: true, ..Default::default() }),
                _ = tokio::time::sleep(INGRESS_START_DELAY) => {}
            }
            let report = self.run_ingress(rps).await;
            if let Err(e) = &report {
                log_event!(error, "ingress", "Ingress failed", error = %e);
                self.trigger.fire();
            }
            report
        };
        let (indexed, forwarded, ingested) = tokio::join!(
            self.fatal_on_exit("indexer", indexer.run(self.trigger.signal())),
            self.fatal_on_exit("server", feed.run(self.trigger.signal())),
            ingress,
        );
        let served = http.await?;
        hub.await?;

        ingested?;
        indexed?;
        forwarded?;
        served.map_err(RuntimeError::Http)
    }

    fn build_indexer(&self) -> Result<Indexer, RuntimeError> {
        let config = &self.container.config;
        let geocoder: Arc<dyn Geocoder> = if config.geocoder.api_key.is_empty() {
            log_event!(
                warn,
                "indexer",
                "No geocoder API key configured, records will not be enriched"
            );
            Arc::new(FixedGeocoder::new())
        } else {
            Arc::new(GoogleGeocoder::new(config.geocoder_config())?)
        };
        let enricher =
            Enricher::with_timeout(geocoder, Duration::from_secs(config.geocoder.timeout_secs));
        Ok(Indexer::new(
            Arc::clone(&self.container.bus),
            Arc::clone(&self.container.store),
            enricher,
            config.indexer_config(),
        )?)
    }

    fn build_feed(&self) -> (Hub, LiveFeed, Router) {
        let config = &self.container.config;
        let (hub, handle) = Hub::new();
        let feed = LiveFeed::new(
            Arc::clone(&self.container.bus),
            handle.clone(),
            config.bus.out_topic.clone(),
        );
        let app = feed_router(FeedState {
            hub: handle,
            search: Arc::new(FlightSearch::new(
                Arc::clone(&self.container.store),
                config.store.index.clone(),
            )),
            listener_buffer: config.feed.listener_buffer,
            pump: config.pump_config(),
        })
        .layer(CorsLayer::permissive());
        (hub, feed, app)
    }

    /// Serve `app` plus the ops endpoints until shutdown.
    fn spawn_http(&self, listener: TcpListener, app: Router) -> JoinHandle<io::Result<()>> {
        let readiness = Arc::clone(&self.container.readiness);
        let app = app.merge(ops_router(Arc::clone(&readiness)));
        let signal = self.trigger.signal();
        let http = self.container.config.http.clone();
        tokio::spawn(async move { serve(listener, app, readiness, signal, &http).await })
    }

    /// Await a long-running stage. It only ends on shutdown, so when it ends
    /// for any other reason the whole process goes down.
    async fn fatal_on_exit<T, E, F>(&self, stage: &'static str, task: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let result = task.await;
        if let Err(e) = &result {
            log_event!(error, stage, "Stage failed", error = %e);
        }
        self.trigger.fire();
        result
    }
}
