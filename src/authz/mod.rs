//! Authorization engine and tenant policy store.
//!
//! The engine is a pure function over a [`Principal`](crate::auth::Principal)
//! and the tenant's policy — no I/O, no mutation — returning a closed set of
//! tagged decisions so every denial path can be tested exhaustively. The
//! policy store holds an immutable snapshot of all tenant policies, swapped
//! atomically on reload; in-flight requests keep the snapshot they captured
//! at entry.

mod engine;
mod registry;

pub use engine::{authorize, Decision, DenyReason};
pub use registry::{PolicySnapshot, PolicyStore, TenantPolicy};
