//! # Indexer → Live Feed
//!
//! Enriched records travel from the indexer over the bus to the live feed,
//! through the hub and out of a real WebSocket; the same server answers the
//! search API from the store the indexer filled.

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use ac_01_ingress::{read_crashes, Pump};
    use ac_02_indexer::{
        adapters::topics, CommitConfig, Enricher, FixedGeocoder, Indexer, IndexerConfig,
    };
    use ac_03_live_feed::{
        router, FeedState, FlightSearch, Hub, HubHandle, LiveFeed, PumpConfig, SearchResponse,
        DEFAULT_LISTENER_BUFFER,
    };
    use futures::StreamExt;
    use node_runtime::{Container, NodeConfig, NodeRuntime, Role};
    use shared_bus::{shutdown_channel, InMemoryBus, ShutdownTrigger, MEMORY_BUS_ADDRESS};
    use shared_store::{InMemoryDocumentStore, MEMORY_STORE_URL};
    use shared_types::{FlightCrash, Location};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;

    use crate::fixtures::{crash_csv, eventually, eventually_async, subscribed, GOOD_ROWS};

    // =========================================================================
    // FIXTURES
    // =========================================================================

    struct FeedServer {
        addr: SocketAddr,
        hub: HubHandle,
        trigger: ShutdownTrigger,
        server: JoinHandle<std::io::Result<()>>,
    }

    async fn start_feed(bus: Arc<InMemoryBus>, store: Arc<InMemoryDocumentStore>) -> FeedServer {
        let (trigger, signal) = shutdown_channel();
        let (hub, handle) = Hub::new();
        tokio::spawn(hub.run(signal.clone()));

        let feed = LiveFeed::new(bus.clone(), handle.clone(), topics::FLIGHTS_ENRICHED);
        let feed_signal = signal.clone();
        tokio::spawn(async move { feed.run(feed_signal).await });
        assert!(subscribed(&bus, topics::FLIGHTS_ENRICHED).await);

        let app = router(FeedState {
            hub: handle.clone(),
            search: Arc::new(FlightSearch::new(store, "flights")),
            listener_buffer: DEFAULT_LISTENER_BUFFER,
            pump: PumpConfig::default(),
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        FeedServer {
            addr,
            hub: handle,
            trigger,
            server,
        }
    }

    fn start_indexer(
        bus: Arc<InMemoryBus>,
        store: Arc<InMemoryDocumentStore>,
    ) -> (ShutdownTrigger, JoinHandle<()>) {
        let geocoder = FixedGeocoder::new()
            .with("Tenerife, Canary Islands", vec![Location::new(28.48, -16.34)])
            .with("Fort Myer, Virginia", vec![Location::new(38.88, -77.08)]);
        let indexer = Indexer::new(
            bus,
            store,
            Enricher::new(Arc::new(geocoder)),
            IndexerConfig {
                commit: CommitConfig {
                    index: "flights".into(),
                    bulk_size: 1,
                },
                ..Default::default()
            },
        )
        .unwrap();
        let (trigger, signal) = shutdown_channel();
        let run = tokio::spawn(async move {
            indexer.run(signal).await.unwrap();
        });
        (trigger, run)
    }

    async fn replay_csv(bus: Arc<InMemoryBus>) {
        let file = read_crashes(crash_csv().as_bytes()).unwrap();
        let (_trigger, signal) = shutdown_channel();
        let report = Pump::new(bus, topics::FLIGHTS, 1000)
            .unwrap()
            .run(file.records, signal)
            .await;
        assert_eq!(report.published, GOOD_ROWS as u64);
    }

    // =========================================================================
    // WEBSOCKET FAN-OUT
    // =========================================================================

    #[tokio::test]
    async fn test_websocket_listeners_receive_enriched_records_in_order() {
        let bus = Arc::new(InMemoryBus::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let feed = start_feed(bus.clone(), store.clone()).await;
        let (indexer_trigger, indexer) = start_indexer(bus.clone(), store.clone());
        assert!(subscribed(&bus, topics::FLIGHTS).await);

        let url = format!("ws://{}/wsapi/ws", feed.addr);
        let (mut first, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        let (mut second, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        assert!(eventually(Duration::from_secs(2), || feed.hub.listener_count() == 2).await);

        replay_csv(bus.clone()).await;

        for socket in [&mut first, &mut second] {
            let mut received = Vec::new();
            while received.len() < 2 {
                let frame = timeout(Duration::from_secs(2), socket.next())
                    .await
                    .expect("no record on the socket")
                    .unwrap()
                    .unwrap();
                if let Message::Text(_) = frame {
                    let record: FlightCrash = serde_json::from_str(frame.to_text().unwrap()).unwrap();
                    assert!(record.location_gps.is_some());
                    received.push(record.location);
                }
            }
            assert_eq!(received, vec!["Fort Myer, Virginia", "Tenerife, Canary Islands"]);
        }

        // Shutdown closes every listener with a close frame.
        feed.trigger.fire();
        let closed = timeout(Duration::from_secs(2), async {
            while let Some(Ok(frame)) = first.next().await {
                if let Message::Close(_) = frame {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap();
        assert!(closed);

        indexer_trigger.fire();
        indexer.await.unwrap();
        timeout(Duration::from_secs(2), feed.server)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_closed_websocket_is_unregistered() {
        let bus = Arc::new(InMemoryBus::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let feed = start_feed(bus, store).await;

        let url = format!("ws://{}/wsapi/ws", feed.addr);
        let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        assert!(eventually(Duration::from_secs(2), || feed.hub.listener_count() == 1).await);

        socket.close(None).await.unwrap();
        assert!(eventually(Duration::from_secs(2), || feed.hub.listener_count() == 0).await);
        feed.trigger.fire();
    }

    // =========================================================================
    // SEARCH API
    // =========================================================================

    #[tokio::test]
    async fn test_search_api_over_indexed_csv() {
        let bus = Arc::new(InMemoryBus::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let feed = start_feed(bus.clone(), store.clone()).await;

        let base = format!("http://{}/api/flights", feed.addr);
        let missing = reqwest::get(&base).await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        let (indexer_trigger, indexer) = start_indexer(bus.clone(), store.clone());
        assert!(subscribed(&bus, topics::FLIGHTS).await);
        replay_csv(bus).await;
        assert!(eventually(Duration::from_secs(2), || store.documents("flights").len() == GOOD_ROWS).await);

        let all: SearchResponse = reqwest::get(&base).await.unwrap().json().await.unwrap();
        assert_eq!(all.total, GOOD_ROWS as u64);
        assert_eq!(all.data[0].location, "Tenerife, Canary Islands");

        let early: SearchResponse = reqwest::get(format!(
            "{base}?from=1900-01-01T00:00:00&to=1912-12-31T23:59:59Z&l=1"
        ))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
        assert_eq!(early.total, 2);
        assert_eq!(early.data.len(), 1);
        assert_eq!(early.data[0].location, "Atlantic City, New Jersey");

        let by_text: SearchResponse = reqwest::get(format!("{base}?query=zeppelin&from=garbage"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(by_text.total, 1);
        assert_eq!(by_text.data[0].location, "Near Johannisthal");

        indexer_trigger.fire();
        indexer.await.unwrap();
        feed.trigger.fire();
    }

    // =========================================================================
    // RUNTIME
    // =========================================================================

    #[tokio::test]
    async fn test_server_role_serves_probes_and_feed_then_drains() {
        let bus = Arc::new(InMemoryBus::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let mut config = NodeConfig::default();
        config.bus.address = MEMORY_BUS_ADDRESS.to_string();
        config.store.urls = vec![MEMORY_STORE_URL.to_string()];
        config.http.drain_delay_secs = 0;
        config.http.graceful_shutdown_timeout_secs = 1;

        let runtime = Arc::new(NodeRuntime::new(Container::with_connections(
            config,
            bus.clone(),
            store,
        )));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let run = {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move { runtime.run(Role::Server, Some(listener)).await })
        };

        let ready = eventually_async(Duration::from_secs(2), || async {
            match reqwest::get(format!("http://{addr}/readyz")).await {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            }
        })
        .await;
        assert!(ready);
        assert!(subscribed(&bus, topics::FLIGHTS_ENRICHED).await);

        let metrics = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
        assert!(metrics.status().is_success());
        let search = reqwest::get(format!("http://{addr}/api/flights")).await.unwrap();
        assert_eq!(search.status(), reqwest::StatusCode::NOT_FOUND);

        runtime.shutdown_trigger().fire();
        timeout(Duration::from_secs(5), run)
            .await
            .expect("server role did not stop")
            .unwrap()
            .unwrap();
        assert!(!runtime.readiness().is_ready());
        assert_eq!(bus.subscriber_count(topics::FLIGHTS_ENRICHED), 0);
    }
}
