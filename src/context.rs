use crate::{BrokerError, Result, User};

/// Per-call request context carrying the authenticated user, if any.
///
/// Identity resolution happens upstream; the broker only reads what was bound
/// here.
///
/// ```rust
/// use scrobble_broker::{RequestContext, User};
///
/// let anonymous = RequestContext::new();
/// assert!(anonymous.user().is_none());
///
/// let ctx = anonymous.with_user(User::new("u-1", "alice"));
/// assert_eq!(ctx.require_user().unwrap().id, "u-1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    user: Option<User>,
}

impl RequestContext {
    /// Create a context with no user bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this context bound to `user`, replacing any previous user.
    pub fn with_user(&self, user: User) -> Self {
        Self { user: Some(user) }
    }

    /// The bound user, if any.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The bound user, or [`BrokerError::AuthenticationRequired`].
    pub fn require_user(&self) -> Result<&User> {
        self.user.as_ref().ok_or(BrokerError::AuthenticationRequired)
    }
}
