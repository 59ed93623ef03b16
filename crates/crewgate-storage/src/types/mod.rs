//! Type definitions for crewgate storage.

mod grants;
mod ids;
mod invitations;
mod memberships;
mod projects;
mod roles;
mod users;
mod workspaces;

// Re-export all types from submodules
pub use grants::*;
pub use ids::*;
pub use invitations::*;
pub use memberships::*;
pub use projects::*;
pub use roles::*;
pub use users::*;
pub use workspaces::*;
