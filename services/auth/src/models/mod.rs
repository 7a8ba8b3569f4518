//! Authentication service models

pub mod audit;
pub mod token;
pub mod user;

// Re-export for convenience
pub use audit::{AuditAction, AuditEntry, RequestContext};
pub use token::{NewRevocation, RevokedToken, TokenType};
pub use user::{LoginCredentials, NewUser, UpdateUser, User, UserProfile};
