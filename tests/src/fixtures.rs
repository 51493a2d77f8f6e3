//! Shared test data and helpers.

use shared_bus::InMemoryBus;
use std::future::Future;
use std::time::Duration;

pub const CSV_HEADER: &str =
    "Date,Time,Location,Operator,Flight #,Route,AC Type,Registration,cn/ln,Aboard,Fatalities,Ground,Summary\n";

/// Four crashes, one row with a broken date, one row with a missing column.
pub const CSV_ROWS: &str = "\
\"September 17, 1908\",17:18,\"Fort Myer, Virginia\",Military - U.S. Army,,Demonstration,Wright Flyer III,,1,2 (passengers:1 crew:1),1 (passengers:1 crew:0),0,Propeller broke.
\"July 12, 1912\",06:30,\"Atlantic City, New Jersey\",Military - U.S. Navy,,Test flight,Dirigible,,,5 (passengers:0 crew:5),5 (passengers:0 crew:5),0,First fatal airship accident.
\"Smarch 40, 1913\",?,Nowhere,?,?,?,?,?,?,1,1,0,?
\"August 06, 1913\",?,\"Victoria, British Columbia\",Private,,,Curtiss seaplane,,,1 (passengers:0 crew:1),1 (passengers:0 crew:1),0
\"March 27, 1977\",17:06,\"Tenerife, Canary Islands\",KLM / Pan Am,4805/1736,Tenerife - Las Palmas,Boeing B-747,PH-BUF/N736PA,20400/19643,644 (passengers:614 crew:30),583 (passengers:560 crew:23),0,Runway collision in fog.
\"October 02, 1913\",10:30,Near Johannisthal,Military - German Navy,?,?,Zeppelin L-2 (airship),?,?,28 (passengers:? crew:?),28 (passengers:0 crew:0),0,?
";

pub const GOOD_ROWS: usize = 4;
pub const BAD_ROWS: usize = 2;

pub fn crash_csv() -> String {
    format!("{CSV_HEADER}{CSV_ROWS}")
}

/// Poll `condition` every few milliseconds until it holds or `limit` passes.
pub async fn eventually<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(limit, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

/// Like [`eventually`] for async probes.
pub async fn eventually_async<F, Fut>(limit: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(limit, async {
        while !probe().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}

/// Wait until someone listens on `topic`; the in-memory bus drops messages
/// published before that.
pub async fn subscribed(bus: &InMemoryBus, topic: &str) -> bool {
    eventually(Duration::from_secs(2), || bus.subscriber_count(topic) > 0).await
}
