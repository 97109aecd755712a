// tests/scheduler_core.rs

use std::error::Error;
use std::sync::Arc;

use workchain::chain::{ChainOutcome, ChainSpec, ExistingChainPolicy, Stage, SubmitOutcome};
use workchain::engine::{Scheduler, WorkOutcome};
use workchain::work::{Constraint, Data, ItemId, WorkRequest, WorkState};
use workchain_test_utils::builders::{board_with, chain_spec, evaluator, satisfied_board};
use workchain_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn scheduler() -> Scheduler {
    Scheduler::new(evaluator(&satisfied_board()), 16)
}

fn ok(data: Data) -> WorkOutcome {
    WorkOutcome::Succeeded(data)
}

fn dispatched_ids(step: &workchain::engine::SchedulerStep) -> Vec<ItemId> {
    step.dispatch.iter().map(|i| i.id).collect()
}

#[test]
fn sequential_chain_runs_one_stage_at_a_time() -> TestResult {
    init_tracing();
    let mut s = scheduler();

    let spec = chain_spec(
        "img",
        ExistingChainPolicy::Replace,
        &[&["cleanup"], &["blur"], &["save"]],
    );
    let ids = spec.item_ids();

    let (outcome, step) = s.submit(spec);
    assert!(matches!(outcome, SubmitOutcome::Enqueued(_)));
    assert_eq!(dispatched_ids(&step), vec![ids[0]]);
    assert_eq!(
        step.transitions(),
        vec![
            (ids[0], WorkState::Enqueued),
            (ids[1], WorkState::Enqueued),
            (ids[2], WorkState::Enqueued),
            (ids[0], WorkState::Running),
        ]
    );

    let step = s.complete(ids[0], ok(Data::new()));
    assert_eq!(dispatched_ids(&step), vec![ids[1]]);
    assert_eq!(s.state_of(ids[2]), Some(WorkState::Enqueued));

    let step = s.complete(ids[1], ok(Data::new()));
    assert_eq!(dispatched_ids(&step), vec![ids[2]]);

    let step = s.complete(ids[2], ok(Data::new()));
    assert!(step.dispatch.is_empty());
    assert_eq!(step.finished.len(), 1);
    assert_eq!(step.finished[0].1, ChainOutcome::Succeeded);
    assert!(s.active_chain("img").is_none());
    assert!(s.is_idle());

    Ok(())
}

#[test]
fn fan_in_waits_for_every_predecessor_and_merges_outputs() -> TestResult {
    let mut s = scheduler();

    let spec = chain_spec("fan", ExistingChainPolicy::Replace, &[&["a", "b"], &["c"]]);
    let ids = spec.item_ids();

    let (_, step) = s.submit(spec);
    assert_eq!(dispatched_ids(&step), vec![ids[0], ids[1]]);

    let step = s.complete(ids[0], ok(Data::new().with("from_a", 1i64)));
    assert!(step.dispatch.is_empty(), "c must wait for b");
    assert_eq!(s.state_of(ids[2]), Some(WorkState::Enqueued));

    let step = s.complete(ids[1], ok(Data::new().with("from_b", 2i64)));
    assert_eq!(dispatched_ids(&step), vec![ids[2]]);

    let input = &step.dispatch[0].input;
    assert_eq!(input.get_int("from_a"), Some(1));
    assert_eq!(input.get_int("from_b"), Some(2));

    Ok(())
}

#[test]
fn predecessor_output_overrides_own_input() -> TestResult {
    let mut s = scheduler();

    let stages = vec![
        Stage::from(WorkRequest::new("first")),
        Stage::from(
            WorkRequest::new("second")
                .with_input(Data::new().with("uri", "own").with("level", 3i64)),
        ),
    ];
    let spec = ChainSpec::new("merge", ExistingChainPolicy::Replace, stages)?;
    let ids = spec.item_ids();
    s.submit(spec);

    let step = s.complete(ids[0], ok(Data::new().with("uri", "from-first")));
    let input = &step.dispatch[0].input;
    assert_eq!(input.get_str("uri"), Some("from-first"));
    assert_eq!(input.get_int("level"), Some(3));

    Ok(())
}

#[test]
fn failure_cancels_downstream_and_fails_chain() -> TestResult {
    let mut s = scheduler();

    let spec = chain_spec(
        "img",
        ExistingChainPolicy::Replace,
        &[&["cleanup"], &["blur"], &["save"]],
    );
    let ids = spec.item_ids();
    s.submit(spec);

    let step = s.complete(ids[0], WorkOutcome::Failed("disk gone".into()));
    assert_eq!(
        step.transitions(),
        vec![
            (ids[0], WorkState::Failed),
            (ids[1], WorkState::Cancelled),
            (ids[2], WorkState::Cancelled),
        ]
    );
    assert!(step.dispatch.is_empty());
    assert!(step.abort.is_empty(), "nothing downstream was running");
    assert_eq!(step.finished[0].1, ChainOutcome::Failed);
    assert_eq!(
        s.item(ids[0]).and_then(|i| i.error.clone()).as_deref(),
        Some("disk gone")
    );
    assert!(s.active_chain("img").is_none());

    Ok(())
}

#[test]
fn failure_leaves_unrelated_siblings_running() -> TestResult {
    let mut s = scheduler();

    let spec = chain_spec("fan", ExistingChainPolicy::Replace, &[&["a", "b"], &["c"]]);
    let ids = spec.item_ids();
    s.submit(spec);

    let step = s.complete(ids[0], WorkOutcome::Failed("boom".into()));
    assert_eq!(s.state_of(ids[1]), Some(WorkState::Running));
    assert_eq!(s.state_of(ids[2]), Some(WorkState::Cancelled));
    assert!(step.finished.is_empty(), "b is still running");

    let step = s.complete(ids[1], ok(Data::new()));
    assert_eq!(s.state_of(ids[1]), Some(WorkState::Succeeded));
    assert_eq!(step.finished[0].1, ChainOutcome::Failed);

    Ok(())
}

#[test]
fn replace_cancels_existing_chain_before_new_one_starts() -> TestResult {
    let mut s = scheduler();

    let old = chain_spec("img", ExistingChainPolicy::Replace, &[&["cleanup"], &["blur"]]);
    let old_ids = old.item_ids();
    let (first, _) = s.submit(old);

    let new = chain_spec("img", ExistingChainPolicy::Replace, &[&["cleanup"], &["blur"]]);
    let new_ids = new.item_ids();
    let (outcome, step) = s.submit(new);

    let SubmitOutcome::Enqueued(chain) = outcome else {
        panic!("expected Enqueued, got {outcome:?}");
    };
    assert_ne!(chain.id, first.chain().id);
    assert_eq!(s.active_chain("img").map(|c| c.id), Some(chain.id));

    assert_eq!(step.abort, vec![old_ids[0]]);
    assert_eq!(step.finished[0].1, ChainOutcome::Cancelled);
    assert_eq!(
        step.transitions(),
        vec![
            (old_ids[0], WorkState::Cancelled),
            (old_ids[1], WorkState::Cancelled),
            (new_ids[0], WorkState::Enqueued),
            (new_ids[1], WorkState::Enqueued),
            (new_ids[0], WorkState::Running),
        ]
    );

    Ok(())
}

#[test]
fn keep_existing_discards_new_submission() -> TestResult {
    let mut s = scheduler();

    let old = chain_spec("img", ExistingChainPolicy::Keep, &[&["cleanup"]]);
    let old_id = old.id;
    s.submit(old);

    let new = chain_spec("img", ExistingChainPolicy::Keep, &[&["cleanup"]]);
    let new_ids = new.item_ids();
    let (outcome, step) = s.submit(new);

    assert!(matches!(outcome, SubmitOutcome::KeptExisting(_)));
    assert_eq!(outcome.chain().id, old_id);
    assert!(step.is_empty());
    assert_eq!(s.state_of(new_ids[0]), None);

    Ok(())
}

#[test]
fn blocked_item_runs_once_its_constraint_holds() -> TestResult {
    let board = board_with(&[(Constraint::Charging, false), (Constraint::StorageNotLow, true)]);
    let mut s = Scheduler::new(evaluator(&board), 16);

    let stages = vec![Stage::from(
        WorkRequest::new("save")
            .with_constraint(Constraint::Charging)
            .with_constraint(Constraint::StorageNotLow),
    )];
    let spec = ChainSpec::new("save", ExistingChainPolicy::Replace, stages)?;
    let id = spec.item_ids()[0];

    let (_, step) = s.submit(spec);
    assert!(step.dispatch.is_empty());
    assert_eq!(s.state_of(id), Some(WorkState::Blocked));

    // Unrelated change: still blocked, nothing dispatched.
    let step = s.constraint_changed(Some(&Constraint::DeviceIdle));
    assert!(step.is_empty());

    board.satisfy(Constraint::Charging);
    let step = s.constraint_changed(Some(&Constraint::Charging));
    assert_eq!(dispatched_ids(&step), vec![id]);
    assert_eq!(step.transitions(), vec![(id, WorkState::Running)]);

    Ok(())
}

#[test]
fn full_reevaluation_releases_blocked_items() -> TestResult {
    let board = board_with(&[(Constraint::NetworkConnected, false)]);
    let mut s = Scheduler::new(evaluator(&board), 16);

    let stages = vec![Stage::from(
        WorkRequest::new("upload").with_constraint(Constraint::NetworkConnected),
    )];
    let spec = ChainSpec::new("upload", ExistingChainPolicy::Replace, stages)?;
    let id = spec.item_ids()[0];
    s.submit(spec);

    board.satisfy(Constraint::NetworkConnected);
    let step = s.constraint_changed(None);
    assert_eq!(dispatched_ids(&step), vec![id]);

    Ok(())
}

#[test]
fn cancelling_blocked_item_needs_no_abort() -> TestResult {
    let board = board_with(&[(Constraint::Charging, false)]);
    let mut s = Scheduler::new(evaluator(&board), 16);

    let stages = vec![Stage::from(WorkRequest::new("save").with_constraint(Constraint::Charging))];
    let spec = ChainSpec::new("save", ExistingChainPolicy::Replace, stages)?;
    let id = spec.item_ids()[0];
    s.submit(spec);

    let (cancelled, step) = s.cancel("save");
    assert!(cancelled);
    assert!(step.abort.is_empty());
    assert_eq!(s.state_of(id), Some(WorkState::Cancelled));

    board.satisfy(Constraint::Charging);
    let step = s.constraint_changed(Some(&Constraint::Charging));
    assert!(step.is_empty(), "cancelled items never leave CANCELLED");

    Ok(())
}

#[test]
fn cancel_is_idempotent_and_ignores_unknown_names() -> TestResult {
    let mut s = scheduler();

    let spec = chain_spec("img", ExistingChainPolicy::Replace, &[&["cleanup"], &["blur"]]);
    let ids = spec.item_ids();
    s.submit(spec);

    let (cancelled, step) = s.cancel("img");
    assert!(cancelled);
    assert_eq!(step.abort, vec![ids[0]]);
    assert_eq!(step.finished[0].1, ChainOutcome::Cancelled);

    let (again, step) = s.cancel("img");
    assert!(!again);
    assert!(step.is_empty());

    let (unknown, _) = s.cancel("nope");
    assert!(!unknown);

    Ok(())
}

#[test]
fn late_completion_of_cancelled_item_is_discarded() -> TestResult {
    let mut s = scheduler();

    let spec = chain_spec("img", ExistingChainPolicy::Replace, &[&["cleanup"], &["blur"]]);
    let ids = spec.item_ids();
    s.submit(spec);
    s.cancel("img");

    let step = s.complete(ids[0], ok(Data::new().with("late", true)));
    assert!(step.is_empty());
    assert_eq!(s.state_of(ids[0]), Some(WorkState::Cancelled));
    assert!(s.item(ids[0]).and_then(|i| i.output.clone()).is_none());

    Ok(())
}

#[test]
fn retention_prunes_oldest_finished_chain() -> TestResult {
    let mut s = Scheduler::new(evaluator(&satisfied_board()), 1);

    let first = chain_spec("one", ExistingChainPolicy::Replace, &[&["a"]]);
    let first_id = first.id;
    let first_item = first.item_ids()[0];
    s.submit(first);
    let step = s.complete(first_item, ok(Data::new()));
    assert!(step.pruned.is_empty());
    assert!(s.knows_chain(first_id));

    let second = chain_spec("two", ExistingChainPolicy::Replace, &[&["a"]]);
    let second_id = second.id;
    let second_item = second.item_ids()[0];
    s.submit(second);
    let step = s.complete(second_item, ok(Data::new()));

    assert_eq!(step.pruned, vec![first_item]);
    assert!(!s.knows_chain(first_id));
    assert_eq!(s.state_of(first_item), None);
    assert_eq!(s.chain_outcome(second_id), Some(ChainOutcome::Succeeded));

    Ok(())
}

#[test]
fn resubmitted_spec_is_rejected_and_live_chain_keeps_running() -> TestResult {
    let mut s = Scheduler::new(evaluator(&satisfied_board()), 1);

    let spec = chain_spec("img", ExistingChainPolicy::Replace, &[&["blur"], &["save"]]);
    let ids = spec.item_ids();
    let (first, _) = s.submit(spec.clone());
    assert!(matches!(first, SubmitOutcome::Enqueued(_)));

    let (again, step) = s.submit(spec);
    assert!(matches!(again, SubmitOutcome::Rejected(_)));
    assert!(step.is_empty());
    assert_eq!(s.active_chain("img").map(|c| c.id), Some(first.chain().id));
    assert_eq!(s.state_of(ids[0]), Some(WorkState::Running));

    let other = chain_spec("other", ExistingChainPolicy::Replace, &[&["a"]]);
    let other_item = other.item_ids()[0];
    s.submit(other);
    let step = s.complete(other_item, ok(Data::new()));
    assert!(step.pruned.is_empty());

    let step = s.complete(ids[0], ok(Data::new()));
    assert_eq!(dispatched_ids(&step), vec![ids[1]]);

    let (cancelled, step) = s.cancel("img");
    assert!(cancelled);
    assert_eq!(step.abort, vec![ids[1]]);
    assert_eq!(s.chain_outcome(first.chain().id), Some(ChainOutcome::Cancelled));
    assert!(s.active_chain("img").is_none());

    Ok(())
}

#[test]
fn shutdown_cancels_every_active_chain() -> TestResult {
    let evaluator = evaluator(&satisfied_board());
    let mut s = Scheduler::new(Arc::clone(&evaluator), 16);

    let a = chain_spec("a", ExistingChainPolicy::Replace, &[&["x"]]);
    let b = chain_spec("b", ExistingChainPolicy::Replace, &[&["y"], &["z"]]);
    let (a_id, b_id) = (a.id, b.id);
    s.submit(a);
    s.submit(b);

    let step = s.cancel_all();
    assert_eq!(step.finished.len(), 2);
    assert_eq!(step.abort.len(), 2);
    assert_eq!(s.chain_outcome(a_id), Some(ChainOutcome::Cancelled));
    assert_eq!(s.chain_outcome(b_id), Some(ChainOutcome::Cancelled));
    assert!(s.is_idle());

    Ok(())
}
