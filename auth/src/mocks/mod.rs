//! Mock provider implementations for testing.
//!
//! In-memory, deterministic implementations of every provider trait. Each
//! mock is cheap to clone; clones share state, so a test keeps one handle
//! for scripting and inspection while the coordinator owns another.

pub mod identity;
pub mod navigator;
pub mod profile;

pub use identity::{MockIdentityProvider, SignInCall, fake_id_token};
pub use navigator::{MockNavigator, Navigation};
pub use profile::MockProfileService;
