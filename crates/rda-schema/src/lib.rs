//! RDA Schema - canonical action representation
//!
//! The intermediate representation that decouples request planning from
//! deterministic execution:
//! - Controlled vocabularies and entity references
//! - Action and ActionRequest containers
//! - Pure validation producing [`ValidatedRequest`]
//! - Operator-facing confirmation rendering
//!
//! # Example
//!
//! ```rust
//! use rda_schema::{Action, ActionRequest, ActionType, EntityKind, Location, Payload};
//!
//! let request = ActionRequest::new(vec![
//!     Action::new(ActionType::Create, EntityKind::Project)
//!         .with_location(Location::in_space("/LAB"))
//!         .with_payload(Payload::with_code("ALPHA")),
//! ]);
//!
//! let validated = request.validate()?;
//! assert_eq!(validated.actions().len(), 1);
//! # Ok::<(), rda_schema::ValidationError>(())
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod summary;
pub mod types;
pub mod validate;

// Re-exports for convenience
pub use error::ValidationError;
pub use summary::confirmation_summary;
pub use types::{
    Action, ActionRequest, ActionType, DatasetKind, EntityKind, Identifier, Location, Metadata,
    Payload,
};
pub use validate::ValidatedRequest;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
