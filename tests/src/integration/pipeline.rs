//! # Ingress → Indexer
//!
//! The CSV is replayed by the ingress pump, consumed by the indexer through
//! the cancelable stream, enriched, bulk committed and re-published.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ac_01_ingress::{read_crashes, Pump};
    use ac_02_indexer::{
        adapters::topics, CommitConfig, Enricher, FixedGeocoder, Indexer, IndexerConfig,
    };
    use ac_03_live_feed::FlightSearch;
    use bytes::Bytes;
    use futures::StreamExt;
    use shared_bus::{open, shutdown_channel, InMemoryBus, MessageBus, SubscriptionTarget};
    use shared_store::{InMemoryDocumentStore, SearchQuery};
    use shared_types::{FlightCrash, Location};
    use tokio::time::timeout;

    use crate::fixtures::{crash_csv, eventually, subscribed, BAD_ROWS, GOOD_ROWS};

    // =========================================================================
    // FIXTURES
    // =========================================================================

    const TENERIFE: &str = "Tenerife, Canary Islands";
    const FORT_MYER: &str = "Fort Myer, Virginia";

    fn geocoder() -> FixedGeocoder {
        FixedGeocoder::new()
            .with(TENERIFE, vec![Location::new(28.48, -16.34), Location::new(0.0, 0.0)])
            .with(FORT_MYER, vec![Location::new(38.88, -77.08)])
            .failing("Near Johannisthal")
    }

    fn indexer_config(bulk_size: usize) -> IndexerConfig {
        IndexerConfig {
            commit: CommitConfig {
                index: "flights".into(),
                bulk_size,
            },
            ..Default::default()
        }
    }

    struct Pipeline {
        bus: Arc<InMemoryBus>,
        store: Arc<InMemoryDocumentStore>,
        indexer: Arc<Indexer>,
    }

    fn pipeline(bulk_size: usize) -> Pipeline {
        let bus = Arc::new(InMemoryBus::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let enricher = Enricher::with_timeout(Arc::new(geocoder()), Duration::from_secs(1));
        let indexer =
            Indexer::new(bus.clone(), store.clone(), enricher, indexer_config(bulk_size)).unwrap();
        Pipeline {
            bus,
            store,
            indexer: Arc::new(indexer),
        }
    }

    // =========================================================================
    // CSV → STORE
    // =========================================================================

    #[tokio::test]
    async fn test_csv_replay_is_enriched_and_indexed() {
        let p = pipeline(3);
        let (out_trigger, out_signal) = shutdown_channel();
        let enriched = open::<FlightCrash>(
            p.bus.as_ref(),
            SubscriptionTarget::topic(topics::FLIGHTS_ENRICHED),
            out_signal,
        )
        .await
        .unwrap();

        let (trigger, signal) = shutdown_channel();
        let run = {
            let indexer = Arc::clone(&p.indexer);
            tokio::spawn(async move { indexer.run(signal).await })
        };
        assert!(subscribed(&p.bus, topics::FLIGHTS).await, "indexer never subscribed");

        let file = read_crashes(crash_csv().as_bytes()).unwrap();
        assert_eq!(file.records.len(), GOOD_ROWS);
        assert_eq!(file.skipped, BAD_ROWS);

        let (_pump_trigger, pump_signal) = shutdown_channel();
        let pump = Pump::new(p.bus.clone(), topics::FLIGHTS, 1000).unwrap();
        let report = pump.run(file.records, pump_signal).await;
        assert_eq!(report.published, GOOD_ROWS as u64);

        // Three flush on the threshold; the fourth waits for shutdown.
        assert!(eventually(Duration::from_secs(2), || p.store.documents("flights").len() == 3).await);
        trigger.fire();
        let committed = timeout(Duration::from_secs(2), run)
            .await
            .expect("indexer did not stop")
            .unwrap()
            .unwrap();

        assert_eq!(committed.committed, GOOD_ROWS);
        assert_eq!(p.store.bulk_calls(), vec![3, 1]);
        assert_eq!(p.store.create_calls(), 1);

        let docs = p.store.documents("flights");
        let with_gps: Vec<_> = docs
            .iter()
            .filter(|doc| doc.get("locationGPS").is_some())
            .collect();
        assert_eq!(with_gps.len(), 2);
        let tenerife = docs.iter().find(|doc| doc["location"] == TENERIFE).unwrap();
        assert_eq!(tenerife["locationGPS"]["lat"], 28.48);

        let stats = p.indexer.enricher().stats();
        assert_eq!(stats.enriched(), 2);
        assert_eq!(stats.no_match(), 1);
        assert_eq!(stats.service_error(), 1);

        // Only records that gained coordinates go back out.
        out_trigger.fire();
        let mut locations: Vec<String> = enriched.map(|record| record.location).collect().await;
        locations.sort();
        assert_eq!(locations, vec![FORT_MYER.to_string(), TENERIFE.to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_messages_do_not_stop_indexing() {
        let p = pipeline(10);
        let (trigger, signal) = shutdown_channel();
        let run = {
            let indexer = Arc::clone(&p.indexer);
            tokio::spawn(async move { indexer.run(signal).await })
        };
        assert!(subscribed(&p.bus, topics::FLIGHTS).await);

        p.bus
            .publish(topics::FLIGHTS, Bytes::from_static(b"{not json"))
            .await
            .unwrap();
        let record = FlightCrash {
            location: FORT_MYER.into(),
            ..Default::default()
        };
        p.bus
            .publish(topics::FLIGHTS, Bytes::from(record.to_json().unwrap()))
            .await
            .unwrap();
        assert!(eventually(Duration::from_secs(1), || p.indexer.enricher().stats().enriched() == 1).await);

        trigger.fire();
        let report = timeout(Duration::from_secs(2), run).await.unwrap().unwrap().unwrap();
        assert_eq!(report.committed, 1);
        assert_eq!(report.batches, 1);
    }

    #[tokio::test]
    async fn test_cancel_before_any_record_creates_index_only() {
        let p = pipeline(10);
        let (trigger, signal) = shutdown_channel();
        trigger.fire();

        let report = p.indexer.run(signal).await.unwrap();

        assert_eq!(report.committed, 0);
        assert!(p.store.bulk_calls().is_empty());
        assert_eq!(p.store.index_names(), vec!["flights".to_string()]);
    }

    // =========================================================================
    // STORE → SEARCH
    // =========================================================================

    #[tokio::test]
    async fn test_indexed_records_are_searchable() {
        let p = pipeline(2);
        let (trigger, signal) = shutdown_channel();
        let run = {
            let indexer = Arc::clone(&p.indexer);
            tokio::spawn(async move { indexer.run(signal).await })
        };
        assert!(subscribed(&p.bus, topics::FLIGHTS).await);

        let file = read_crashes(crash_csv().as_bytes()).unwrap();
        let (_pump_trigger, pump_signal) = shutdown_channel();
        Pump::new(p.bus.clone(), topics::FLIGHTS, 1000)
            .unwrap()
            .run(file.records, pump_signal)
            .await;
        assert!(eventually(Duration::from_secs(2), || p.store.documents("flights").len() == GOOD_ROWS).await);
        trigger.fire();
        run.await.unwrap().unwrap();

        let search = FlightSearch::new(p.store.clone(), "flights");

        let everything = search
            .search(&SearchQuery::new().sort("-date"))
            .await
            .unwrap();
        assert_eq!(everything.total, GOOD_ROWS as u64);
        assert_eq!(everything.data[0].location, TENERIFE);
        assert!(everything.data.iter().all(|record| !record.id.is_empty()));

        let navy = search
            .search(&SearchQuery::new().query("navy"))
            .await
            .unwrap();
        let mut operators: Vec<_> = navy.data.iter().map(|r| r.operator.as_str()).collect();
        operators.sort_unstable();
        assert_eq!(operators, vec!["Military - German Navy", "Military - U.S. Navy"]);
    }
}
