//! Local filesystem helpers: the per-run scratch directory and owner-only writes.

pub mod private;
pub mod scratch;

pub use private::write_private;
pub use scratch::ScratchDir;
