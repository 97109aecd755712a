// tests/status_bus.rs

use std::error::Error;

use workchain::chain::{ChainSpec, ExistingChainPolicy, Stage};
use workchain::status::{ItemStatus, StatusBus, StatusFilter};
use workchain::work::{WorkItem, WorkRequest, WorkState};
use workchain_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// Items of a one-stage chain named `name`, one per kind.
fn items(name: &str, kinds: &[&str]) -> Vec<WorkItem> {
    let stage: Stage = kinds
        .iter()
        .map(|k| {
            let request = WorkRequest::new(*k);
            if *k == "save" { request.with_tag("OUTPUT") } else { request }
        })
        .collect();
    ChainSpec::new(name, ExistingChainPolicy::Replace, vec![stage])
        .expect("valid chain")
        .items
}

fn status(item: &WorkItem, state: WorkState) -> ItemStatus {
    let mut status = ItemStatus::from_item(item);
    status.state = state;
    status
}

#[tokio::test]
async fn feed_starts_with_current_snapshot_then_follows_changes() -> TestResult {
    init_tracing();

    let bus = StatusBus::new(16);
    let img = items("img", &["blur"]);
    bus.publish([status(&img[0], WorkState::Enqueued)]);

    let mut feed = bus.observe(StatusFilter::chain("img"));
    let first = with_timeout(feed.next()).await.ok_or("feed closed")?;
    assert_eq!(first.states(), vec![(img[0].id, "blur", WorkState::Enqueued)]);

    bus.publish([status(&img[0], WorkState::Running)]);
    let second = with_timeout(feed.next()).await.ok_or("feed closed")?;
    assert_eq!(second.states(), vec![(img[0].id, "blur", WorkState::Running)]);

    Ok(())
}

#[tokio::test]
async fn feeds_only_see_matching_items() -> TestResult {
    let bus = StatusBus::new(16);
    let img = items("img", &["blur", "save"]);
    let other = items("other", &["sync"]);

    let mut by_chain = bus.observe(StatusFilter::chain("img"));
    let mut by_tag = bus.observe(StatusFilter::tag("OUTPUT"));
    by_chain.next().await;
    by_tag.next().await;

    bus.publish([status(&other[0], WorkState::Running)]);
    bus.publish([status(&img[1], WorkState::Running)]);

    let chain_view = with_timeout(by_chain.next()).await.ok_or("feed closed")?;
    assert_eq!(chain_view.len(), 1);
    assert_eq!(chain_view.entries()[0].id, img[1].id);

    let tag_view = with_timeout(by_tag.next()).await.ok_or("feed closed")?;
    assert_eq!(tag_view.len(), 1);
    assert_eq!(tag_view.entries()[0].kind, "save");

    assert_eq!(bus.snapshot(&StatusFilter::chain("other")).len(), 1);

    Ok(())
}

#[tokio::test]
async fn lagging_feed_skips_to_latest_snapshot() -> TestResult {
    let bus = StatusBus::new(2);
    let img = items("img", &["blur"]);

    let mut feed = bus.observe(StatusFilter::chain("img"));
    feed.next().await;

    for state in [
        WorkState::Enqueued,
        WorkState::Blocked,
        WorkState::Running,
        WorkState::Succeeded,
    ] {
        bus.publish([status(&img[0], state)]);
    }

    let latest = with_timeout(feed.next()).await.ok_or("feed closed")?;
    assert_eq!(latest.states(), vec![(img[0].id, "blur", WorkState::Succeeded)]);

    Ok(())
}

#[tokio::test]
async fn removed_items_disappear_from_feeds() -> TestResult {
    let bus = StatusBus::new(16);
    let img = items("img", &["a", "b"]);
    bus.publish(img.iter().map(|i| status(i, WorkState::Succeeded)));

    let mut feed = bus.observe(StatusFilter::chain("img"));
    assert_eq!(feed.next().await.map(|s| s.len()), Some(2));

    bus.remove(vec![img[0].id]);
    let after = with_timeout(feed.next()).await.ok_or("feed closed")?;
    assert_eq!(after.len(), 1);
    assert!(after.get(img[0].id).is_none());

    Ok(())
}

#[tokio::test]
async fn feed_ends_when_bus_is_dropped() -> TestResult {
    let bus = StatusBus::new(16);
    let mut feed = bus.observe(StatusFilter::chain("img"));
    assert!(feed.next().await.is_some());

    drop(bus);
    assert!(with_timeout(feed.next()).await.is_none());

    Ok(())
}

#[tokio::test]
async fn wait_for_returns_first_matching_snapshot() -> TestResult {
    let bus = StatusBus::new(16);
    let img = items("img", &["blur"]);
    let mut feed = bus.observe(StatusFilter::chain("img"));

    let publisher = {
        let bus = bus.clone();
        let item = img[0].clone();
        tokio::spawn(async move {
            for state in [WorkState::Enqueued, WorkState::Running, WorkState::Failed] {
                bus.publish([status(&item, state)]);
                tokio::task::yield_now().await;
            }
        })
    };

    let done = with_timeout(feed.wait_for(|s| s.is_terminal()))
        .await
        .ok_or("feed closed")?;
    assert_eq!(done.entries()[0].state, WorkState::Failed);
    publisher.await?;

    Ok(())
}
