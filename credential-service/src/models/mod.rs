mod audit_log;
mod invitation;
mod password_reset;
mod user;

pub use audit_log::*;
pub use invitation::*;
pub use password_reset::*;
pub use user::*;
