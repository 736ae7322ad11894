//! External collaborators of the coordinator.
//!
//! The reducer depends on these traits only; concrete implementations are
//! injected through [`SessionEnvironment`](crate::environment::SessionEnvironment).
//!
//! ```text
//! ┌────────────────────┐  session events   ┌──────────────────┐
//! │ IdentityProvider   │──────────────────▶│ Session reducer  │
//! │ (sign-in, tokens)  │◀──────────────────│                  │
//! └────────────────────┘  commands         │                  │
//! ┌────────────────────┐  profile fetch    │                  │
//! │ ProfileService     │◀─────────────────▶│                  │
//! └────────────────────┘                   │                  │
//! ┌────────────────────┐  navigate(replace)│                  │
//! │ Navigator          │◀──────────────────│                  │
//! └────────────────────┘                   └──────────────────┘
//! ```
//!
//! This enables:
//! - **Testing**: in-memory mocks (see [`crate::mocks`])
//! - **Production**: a hosted identity service and the REST profile client

pub mod identity;
pub mod navigator;
pub mod profile;

pub use identity::{IdentityProvider, ProviderSubscription, RawUser};
pub use navigator::Navigator;
pub use profile::ProfileService;
