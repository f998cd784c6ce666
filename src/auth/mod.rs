pub mod cookies;
pub mod handlers;
pub mod middleware;
pub mod password;
pub mod token;
pub mod types;

pub use cookies::{ACCESS_COOKIE, REFRESH_COOKIE};
pub use handlers::*;
pub use middleware::{require_auth, AuthUser};
pub use token::{Claims, Identity, TokenError, TokenKind, TokenPair, TokenService};
pub use types::*;
