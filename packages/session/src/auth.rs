//! Current-user identity and authorization gates.

use serde::{Deserialize, Serialize};

/// Identity supplied by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    /// Account id.
    pub id: String,
    /// Name shown on reports and posts.
    pub display_name: String,
    /// Account email.
    #[serde(default)]
    pub email: Option<String>,
    /// Whether the user may change report status.
    #[serde(default)]
    pub is_admin: bool,
}

/// Where to send a user who must log in first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRedirect {
    /// Login page.
    pub login_path: String,
    /// Page to return to after logging in.
    pub return_to: String,
}

impl AuthRedirect {
    /// Login page used for every redirect.
    pub const LOGIN_PATH: &'static str = "/login";

    #[must_use]
    pub fn to_login(return_to: impl Into<String>) -> Self {
        Self {
            login_path: Self::LOGIN_PATH.to_string(),
            return_to: return_to.into(),
        }
    }
}

/// Why a gated action was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthGate {
    /// Nobody is logged in.
    LoginRequired(AuthRedirect),
    /// Logged in, but not an administrator.
    Forbidden,
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// The authentication collaborator has not reported yet.
    AwaitingAuth,
    /// Auth is ready and nobody is logged in.
    SignedOut,
    /// Auth is ready and `AuthUser` is logged in.
    SignedIn(AuthUser),
}

/// Explicit auth context for one client session.
///
/// Created in [`SessionState::AwaitingAuth`], initialized once the
/// authentication collaborator is ready, and torn down on logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SessionState::AwaitingAuth,
        }
    }

    /// Builds an initialized session for a request whose identity is
    /// already known.
    #[must_use]
    pub fn with_identity(user: Option<AuthUser>) -> Self {
        let mut session = Self::new();
        session.on_auth_ready(user);
        session
    }

    /// Called once the authentication collaborator has resolved the
    /// current user (if any).
    pub fn on_auth_ready(&mut self, user: Option<AuthUser>) {
        self.state = user.map_or(SessionState::SignedOut, SessionState::SignedIn);
    }

    /// Records a successful login.
    pub fn sign_in(&mut self, user: AuthUser) {
        log::debug!("Session signed in as {}", user.id);
        self.state = SessionState::SignedIn(user);
    }

    /// Tears the session down on logout.
    pub fn sign_out(&mut self) {
        if let SessionState::SignedIn(user) = &self.state {
            log::debug!("Session for {} signed out", user.id);
        }
        self.state = SessionState::SignedOut;
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub const fn user(&self) -> Option<&AuthUser> {
        match &self.state {
            SessionState::SignedIn(user) => Some(user),
            SessionState::AwaitingAuth | SessionState::SignedOut => None,
        }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(&self.state, SessionState::SignedIn(user) if user.is_admin)
    }

    /// Returns the logged-in user or a redirect to the login page.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthRedirect`] back to `return_to` if nobody is logged
    /// in.
    pub fn require_user(&self, return_to: &str) -> Result<&AuthUser, AuthRedirect> {
        self.user().ok_or_else(|| AuthRedirect::to_login(return_to))
    }

    /// Returns the logged-in administrator.
    ///
    /// # Errors
    ///
    /// * [`AuthGate::LoginRequired`] if nobody is logged in
    /// * [`AuthGate::Forbidden`] if the user is not an administrator
    pub fn require_admin(&self, return_to: &str) -> Result<&AuthUser, AuthGate> {
        let user = self.require_user(return_to).map_err(AuthGate::LoginRequired)?;
        if user.is_admin {
            Ok(user)
        } else {
            Err(AuthGate::Forbidden)
        }
    }
}
