// ABOUTME: Validated domain types shared across the orchestrator.
// ABOUTME: Unit identifiers, image references, and content digests.

mod digest;
mod image_ref;
mod unit_id;

pub use digest::{Digest, DigestError};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use unit_id::{UnitId, UnitIdError};
