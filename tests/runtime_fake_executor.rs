// tests/runtime_fake_executor.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, timeout};

use workchain::chain::{ChainOutcome, ExistingChainPolicy, SubmitOutcome};
use workchain::engine::{CoreRuntime, Runtime, RuntimeEvent, Scheduler};
use workchain::status::{StatusBus, StatusFilter};
use workchain::work::WorkState;
use workchain_test_utils::builders::{chain_spec, evaluator, satisfied_board};
use workchain_test_utils::fake_executor::FakeExecutor;
use workchain_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn runtime_with_fake_executor_runs_simple_chain() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone());
    let bus = StatusBus::new(64);

    let core = CoreRuntime::new(Scheduler::new(evaluator(&satisfied_board()), 16));
    let runtime = Runtime::new(core, rt_rx, executor, bus.clone());
    let handle = tokio::spawn(runtime.run());

    let mut feed = bus.observe(StatusFilter::chain("img"));

    let spec = chain_spec(
        "img",
        ExistingChainPolicy::Replace,
        &[&["cleanup"], &["blur"], &["save"]],
    );
    let (reply, reply_rx) = oneshot::channel();
    rt_tx.send(RuntimeEvent::Submit { spec, reply }).await?;
    let outcome = reply_rx.await?;
    assert!(matches!(outcome, SubmitOutcome::Enqueued(_)));

    let done = timeout(
        Duration::from_secs(3),
        feed.wait_for(|s| s.len() == 3 && s.is_terminal()),
    )
    .await?
    .ok_or("status feed closed early")?;
    assert_eq!(done.outcome(), Some(ChainOutcome::Succeeded));

    let executed = executed.lock().unwrap().clone();
    assert_eq!(executed, vec!["cleanup", "blur", "save"]);

    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;
    timeout(Duration::from_secs(3), handle).await???;

    Ok(())
}

#[tokio::test]
async fn runtime_propagates_failure_to_observers() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone()).failing("blur");
    let bus = StatusBus::new(64);

    let core = CoreRuntime::new(Scheduler::new(evaluator(&satisfied_board()), 16));
    let handle = tokio::spawn(Runtime::new(core, rt_rx, executor, bus.clone()).run());

    let mut feed = bus.observe(StatusFilter::chain("img"));

    let spec = chain_spec(
        "img",
        ExistingChainPolicy::Replace,
        &[&["cleanup"], &["blur"], &["save"]],
    );
    let ids = spec.item_ids();
    let (reply, reply_rx) = oneshot::channel();
    rt_tx.send(RuntimeEvent::Submit { spec, reply }).await?;
    reply_rx.await?;

    let done = timeout(
        Duration::from_secs(3),
        feed.wait_for(|s| s.len() == 3 && s.is_terminal()),
    )
    .await?
    .ok_or("status feed closed early")?;

    let states: Vec<_> = done.iter().map(|s| (s.id, s.state)).collect();
    assert_eq!(
        states,
        vec![
            (ids[0], WorkState::Succeeded),
            (ids[1], WorkState::Failed),
            (ids[2], WorkState::Cancelled),
        ]
    );
    assert_eq!(done.get(ids[1]).and_then(|s| s.error.clone()).as_deref(), Some("blur failed"));
    assert_eq!(*executed.lock().unwrap(), vec!["cleanup", "blur"]);

    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;
    timeout(Duration::from_secs(3), handle).await???;

    Ok(())
}

#[tokio::test]
async fn runtime_stops_on_shutdown_request() -> TestResult {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(4);
    let executor = FakeExecutor::new(rt_tx.clone(), Arc::new(Mutex::new(Vec::new())));
    let core = CoreRuntime::new(Scheduler::new(evaluator(&satisfied_board()), 16));
    let runtime = Runtime::new(core, rt_rx, executor, StatusBus::new(8));

    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;
    timeout(Duration::from_secs(1), runtime.run()).await??;

    Ok(())
}
