//! User accounts and new-account provisioning.
//!
//! # Data Flow
//! ```text
//! POST /api/user/signup
//!     → store.rs (create user in a fresh org as Admin)
//!     → EventBus<SignUpCompleted>::publish
//!     → setup.rs (UserSetupService listener)
//!         1. find user by email
//!         2. add the dummy org admin
//!         3. demote the user to Editor
//!         4. copy the main datasource into the new org
//! ```

pub mod setup;
pub mod store;

pub use setup::{SetupError, UserSetupService};
pub use store::{AccountError, AccountStore, CreateUserCommand, InMemoryAccountStore, User};
