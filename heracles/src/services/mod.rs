//! Services layer for heracles.
//!
//! Credential resolution, realm authorization, audit recording and the
//! management operations built on them. Every service holds its
//! collaborators explicitly; nothing is global except metrics.

pub mod admin;
mod audit;
mod authorizer;
pub mod error;
mod federation;
mod gateway;
pub mod metrics;
mod password;
mod resolver;
mod secret_codec;
mod session;
pub mod store;
mod tokens;

pub use admin::AdminService;
pub use audit::{audit_data, AuditRecorder, RECENT_LIMIT};
pub use authorizer::{AuthzDecision, DenyReason, RealmAuthorizer};
pub use error::ServiceError;
pub use federation::{AutoProvision, FederatedLogin};
pub use gateway::{GatewayFacade, RadiusVerdict, ValidateOutcome, ValidatedIdentity};
pub use password::PasswordHasher;
pub use resolver::{BasicCredentials, CredentialBag, CredentialResolver, ResolvedIdentity, Strategy};
pub use secret_codec::{InvalidSignature, SecretCodec};
pub use session::{IssuedSecret, SessionService};
pub use store::{MemoryStore, PgStore, Store};
pub use tokens::{TokenService, TokenUpdate};
