pub mod permissions;
pub mod session;

pub use session::{AuthenticatedUser, CurrentUser, SessionKeys, SESSION_COOKIE};
