//! Message-relay and thread-lifecycle engine.
//!
//! Maps each applicant to a dedicated staff-group topic, mirrors messages,
//! edits, and reactions between the applicant's private chat and that topic,
//! and applies the status transitions those actions imply. Every decision is
//! re-derived from storage; the engine holds no state of its own, so
//! concurrent handlers and process restarts converge on the same answers.

pub mod coordinator;
pub mod directory;
pub mod gateway;
pub mod mirror;
pub mod propagator;

pub use coordinator::{AcceptanceOutcome, StatusCoordinator};
pub use directory::ThreadDirectory;
pub use gateway::{Destination, RelayGateway};
pub use mirror::{InboundMessage, MessageMirror, MirroredMessage};
pub use propagator::{EditContent, Propagator, APPLICANT_EDIT_PREFIX};
