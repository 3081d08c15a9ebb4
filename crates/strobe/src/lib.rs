//! strobe: the scheduling core of an event-driven HDL simulator compiler.
//!
//! Given an elaborated, scoped design (scopes, variables, sensitivity
//! trees and activation blocks), [`sched::schedule`] transforms the design
//! into an explicit evaluation plan: the `_eval` entry point and its helper
//! functions, implementing the source language's event-driven semantics as
//! ordinary sequential code. [`interp::Sim`] executes the emitted plan.

pub mod cycle_break;
pub mod debug;
pub mod interp;
pub mod ir;
pub mod order;
pub mod partition;
pub mod replicate;
pub mod sched;

pub use debug::ScheduleTrace;
pub use interp::{RunError, Sim};
pub use ir::{DType, EdgeKind, Expr, LValue, Netlist, SenItem, SenTree, Stmt};
pub use malachite_bigint::BigUint;
pub use sched::{SchedError, SchedOptions, schedule};

pub(crate) use fxhash::FxHashMap as HashMap;
pub(crate) use fxhash::FxHashSet as HashSet;
