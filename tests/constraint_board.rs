// tests/constraint_board.rs

use std::error::Error;
use std::sync::Arc;

use tokio::sync::mpsc;
use workchain::constraints::{ConstraintBoard, spawn_constraint_listener};
use workchain::engine::RuntimeEvent;
use workchain::work::{Constraint, ConstraintEvaluator};
use workchain_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn unset_constraints_are_unsatisfied() {
    let board = ConstraintBoard::new();
    assert!(!board.is_satisfied(&Constraint::Charging));
    assert!(!board.is_satisfied(&Constraint::Custom("wifi_only".into())));
}

#[test]
fn parses_names_and_aliases() -> TestResult {
    assert_eq!("charging".parse::<Constraint>()?, Constraint::Charging);
    assert_eq!("power".parse::<Constraint>()?, Constraint::Charging);
    assert_eq!("storage_not_low".parse::<Constraint>()?, Constraint::StorageNotLow);
    assert_eq!(
        "metered_ok".parse::<Constraint>()?,
        Constraint::Custom("metered_ok".into())
    );
    assert!("".parse::<Constraint>().is_err());
    Ok(())
}

#[tokio::test]
async fn only_value_changes_are_broadcast() -> TestResult {
    let board = ConstraintBoard::with_values([(Constraint::Charging, false)]);
    let mut rx = board.subscribe();

    assert!(!board.unsatisfy(Constraint::Charging));
    assert!(board.satisfy(Constraint::Charging));
    assert!(!board.satisfy(Constraint::Charging));

    let change = with_timeout(rx.recv()).await?;
    assert_eq!(change.constraint, Constraint::Charging);
    assert!(change.satisfied);
    assert!(rx.try_recv().is_err(), "repeated levels must not be broadcast");

    Ok(())
}

#[tokio::test]
async fn listener_forwards_changes_to_runtime() -> TestResult {
    init_tracing();

    let board = Arc::new(ConstraintBoard::new());
    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(8);
    let evaluator: Arc<dyn ConstraintEvaluator> = board.clone();
    let handle = spawn_constraint_listener(evaluator, tx);

    board.satisfy(Constraint::DeviceIdle);

    let event = with_timeout(rx.recv()).await.ok_or("listener stopped")?;
    assert!(matches!(
        event,
        RuntimeEvent::ConstraintChanged(Some(Constraint::DeviceIdle))
    ));

    handle.abort();
    Ok(())
}
