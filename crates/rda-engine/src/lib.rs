//! RDA Engine - deterministic execution of structured repository operations
//!
//! Takes a validated batch of actions and runs it against a live repository
//! session:
//! - Resolves entity references (paths and permanent ids)
//! - Dispatches each action to its typed handler
//! - Defers CREATE/UPDATE persistence to a single commit
//! - Aborts transactional batches on first failure, with best-effort cleanup
//! - Normalizes remote entities back into the canonical response shape
//!
//! # Example
//!
//! ```rust,ignore
//! use rda_engine::{EngineConfig, Executor};
//!
//! # async fn example(repo: &dyn rda_engine::Repository) -> anyhow::Result<()> {
//! let request = build_request().validate()?;
//! let executor = Executor::new(EngineConfig::new());
//!
//! let report = executor.execute(request, repo).await?;
//! println!("{}/{} actions succeeded", report.succeeded, report.outcomes.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod executor;
pub mod normalize;
pub mod repository;
pub mod resolver;
pub mod result;

// Re-exports for convenience
pub use error::{ActionError, CleanupFailure, ResolutionError, TransactionAbort};
pub use executor::{EngineConfig, Executor, TransactionContext};
pub use normalize::{normalize_entity, NormalizedEntity};
pub use repository::{
    CommittedEntity, EntityDraft, EntityView, FrozenFlags, LineageRef, PendingEntity, Relations,
    RemoteRef, Repository, RepositoryError, UpdateTarget,
};
pub use resolver::{classify_path, resolve_reference, PERM_ID_PROBE_ORDER};
pub use result::{ActionOutcome, BatchState, ExecutionReport};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the engine
    pub use crate::{
        ActionOutcome, BatchState, EngineConfig, EntityView, ExecutionReport, Executor,
        Repository, RepositoryError, TransactionAbort,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
