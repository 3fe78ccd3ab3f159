//! Domain records exchanged with the note repository.
//!
//! # Responsibility
//! - Define the read model returned by repository operations.
//! - Define pre-validated write payloads and pagination input.
//!
//! # Invariants
//! - Every note carries its owner; owners never change after creation.
//! - Keyword names are unique per owner.

pub mod note;
pub mod page;
