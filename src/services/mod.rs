pub mod backup_codes;
pub mod cookie;
pub mod session;
pub mod totp;
pub mod vault;

pub use backup_codes::BackupCodeService;
pub use cookie::{SESSION_COOKIE_NAME, build_session_cookie, clear_session_cookie};
pub use session::{Claims, SessionKind, SessionService};
pub use totp::TotpService;
pub use vault::SecretVault;
