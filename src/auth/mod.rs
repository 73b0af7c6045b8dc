pub mod firebase;
pub mod session;

pub use firebase::FirebaseAuth;
pub use session::{AuthObserver, AuthSessions, LogObserver};

/// A signed-in account as reported by the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub uid: String,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
}

// Tokens stay out of logs.
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn(User),
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, AuthState::SignedIn(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::SignedIn(user) => Some(user),
            AuthState::SignedOut => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_tokens() {
        let user = User {
            uid: "uid-1".to_string(),
            email: "chihiro@example.com".to_string(),
            id_token: "secret-id-token".to_string(),
            refresh_token: "secret-refresh".to_string(),
        };
        let printed = format!("{:?}", AuthState::SignedIn(user));
        assert!(printed.contains("chihiro@example.com"));
        assert!(!printed.contains("secret"));
    }
}
