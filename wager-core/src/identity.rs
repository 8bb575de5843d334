//! Identity seam. Real authentication lives in an external identity
//! provider; the engine only needs a stable verified identifier (an email
//! address) for the acting user.

/// Supplies the acting user's identity. `None` means no user is signed in
/// and every role-specific operation is refused.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<String>;
}

/// Fixed identity, for the CLI (`--identity`) and for tests.
pub struct FixedIdentity(String);

impl FixedIdentity {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }
}

impl IdentityProvider for FixedIdentity {
    fn current_identity(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// No signed-in user. Useful for exercising the refusal paths.
pub struct NoIdentity;

impl IdentityProvider for NoIdentity {
    fn current_identity(&self) -> Option<String> {
        None
    }
}
