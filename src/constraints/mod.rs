// src/constraints/mod.rs

//! Constraint sensing.
//!
//! - [`board`] is an in-memory [`ConstraintEvaluator`](crate::work::ConstraintEvaluator)
//!   whose values are pushed in from outside.
//! - [`listener`] forwards evaluator changes into the runtime loop.

pub mod board;
pub mod listener;

pub use board::ConstraintBoard;
pub use listener::spawn_constraint_listener;
