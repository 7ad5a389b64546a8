//! Pipeline stages for archiving an export.
//!
//! Each submodule implements exactly one step. Keeping stages separate makes
//! each independently testable and lets the browser or archive service be
//! swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ naming ──▶ chain ──┬──▶ render  (headless Chrome, hard timeout)
//! (records)   (target)   (order) └──▶ lookup  (Wayback snapshot, probe)
//! ```
//!
//! 1. [`extract`]: parse CSV / HTML / URL list into records
//! 2. [`naming`]:  folder from first tag, collision-free file name
//! 3. [`chain`]:   primary → archival → direct, stop at first success
//! 4. [`render`]:  one browser process per attempt, killed on timeout;
//!    the only stage that blocks on an external process
//! 5. [`lookup`]:  archive availability query and reachability probe; the
//!    only stage with network I/O of its own

pub mod chain;
pub mod extract;
pub mod lookup;
pub mod naming;
pub mod render;
