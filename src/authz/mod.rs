mod precedence;
mod resolver;

pub use precedence::{AdminChangeRefusal, DeletionRefusal, check_admin_change, check_user_deletion};
pub use resolver::PermissionResolver;
