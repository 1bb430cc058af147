pub mod bearer;
pub mod clock;
pub mod error;
pub mod factory;
pub mod jwks;
pub mod verifier;

pub use error::{AuthError, AuthErrorKind};
pub use factory::build_token_verifier;
pub use verifier::{AuthOutcome, Claims, TokenVerifier, VerifierConfig};
