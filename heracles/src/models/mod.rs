mod audit_log;
mod capability;
mod realm;
mod user;
mod user_token;

pub use audit_log::{AuditAction, AuditData, AuditDraft, AuditLogEntry, NewAuditLogEntry};
pub use capability::{TokenFlags, UserFlags};
pub use realm::{Realm, UserRealmGrant};
pub use user::{ExternalProvider, NewUser, User, UserResponse};
pub use user_token::{NewUserToken, TokenResponse, UserToken, TOKEN_SECRET_BYTES};
