#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unused_self)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::borrowed_box)]
#![allow(clippy::float_cmp)]
#![allow(clippy::ref_option)]

//! # Coordinator Core
//!
//! Core coordination engine for a multi-agent software-task orchestrator:
//! an event bus, a task context store, four-tier memory with outcome
//! prediction, a hybrid (pattern + AI) dependency inferer, and the
//! [`coordinator::Coordinator`] façade that ties them together.
//!
//! ## Module Organization
//!
//! - [`events`]: pub/sub event bus with wildcard subscriptions and bounded history
//! - [`context`]: architectural decisions, implementation records, dependent-task context
//! - [`memory`]: working/episodic/semantic/procedural tiers and outcome prediction
//! - [`dependency`]: pattern-based and hybrid dependency inference, cycle removal, critical path
//! - [`external`]: Kanban provider and LLM dependency-refiner trait boundaries
//! - [`persistence`]: storage backend abstraction and named collections
//! - [`resilience`]: retry with jittered backoff, circuit breakers, fallback composition
//! - [`types`]: shared data model and configuration types
//! - [`error`]: the closed error taxonomy
//!
//! ## Quick Start
//!
//! ```no_run
//! use coordinator_core::coordinator::Coordinator;
//! use coordinator_core::types::CoordinatorConfig;
//! use std::sync::Arc;
//! # use coordinator_core::external::KanbanProvider;
//! # fn kanban() -> Arc<dyn KanbanProvider> { unimplemented!() }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let coordinator = Coordinator::new(&CoordinatorConfig::default(), kanban(), None);
//! coordinator.register_agent("agent-1").await;
//!
//! if let Some(bundle) = coordinator.request_next_task("agent-1").await {
//!     println!("assigned {}", bundle.task.name);
//! }
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Most fallible operations return [`error::Result<T>`]:
//!
//! ```no_run
//! use coordinator_core::error::{Error, Result};
//!
//! async fn example() -> Result<()> {
//!     // Operations that can fail
//!     // .await?
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod coordinator;
pub mod dependency;
pub mod error;
pub mod events;
pub mod external;
pub mod memory;
pub mod persistence;
pub mod resilience;
pub mod types;

pub use coordinator::{Coordinator, NextTaskBundle};
pub use error::{Error, Result};
