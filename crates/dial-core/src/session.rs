use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{Error, Result};

/// Who is driving the daemon right now.
///
/// Credential checks belong to the auth provider in front of the API;
/// installing a session only records its outcome. One session exists per
/// daemon process, one signed-in user at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Session {
    #[default]
    Anonymous,
    User {
        id: String,
        #[serde(default)]
        admin: bool,
    },
}

impl Session {
    pub fn user(id: impl Into<String>) -> Self {
        Session::User {
            id: id.into(),
            admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Session::User {
            id: id.into(),
            admin: true,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Session::User { id, .. } => Some(id),
            Session::Anonymous => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Session::User { admin: true, .. })
    }

    /// The signed-in user id, or `Unauthorized` for anonymous callers.
    pub fn require_user(&self) -> Result<&str> {
        self.user_id()
            .ok_or_else(|| Error::Unauthorized("sign in to do this".to_string()))
    }

    /// The signed-in administrator id, or `Unauthorized` otherwise.
    pub fn require_admin(&self) -> Result<&str> {
        match self {
            Session::User { id, admin: true } => Ok(id),
            _ => Err(Error::Unauthorized(
                "administrator access required".to_string(),
            )),
        }
    }
}

/// Single owner of the process-wide session state.
#[derive(Clone, Default)]
pub struct SessionManager {
    current: Arc<RwLock<Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Session {
        self.current.read().await.clone()
    }

    pub async fn login(&self, id: impl Into<String>, admin: bool) -> Session {
        let session = Session::User {
            id: id.into(),
            admin,
        };
        *self.current.write().await = session.clone();
        session
    }

    pub async fn logout(&self) {
        *self.current.write().await = Session::Anonymous;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_has_no_user() {
        let session = Session::Anonymous;
        assert_eq!(session.user_id(), None);
        assert!(session.require_user().is_err());
        assert!(session.require_admin().is_err());
    }

    #[test]
    fn test_user_is_not_admin() {
        let session = Session::user("u1");
        assert_eq!(session.require_user().unwrap(), "u1");
        assert!(!session.is_admin());
        assert!(session.require_admin().is_err());
    }

    #[test]
    fn test_admin_passes_both_checks() {
        let session = Session::admin("root");
        assert_eq!(session.require_user().unwrap(), "root");
        assert_eq!(session.require_admin().unwrap(), "root");
    }

    #[tokio::test]
    async fn test_manager_login_logout() {
        let manager = SessionManager::new();
        assert_eq!(manager.current().await, Session::Anonymous);

        manager.login("u1", false).await;
        assert_eq!(manager.current().await.user_id(), Some("u1"));

        manager.logout().await;
        assert_eq!(manager.current().await, Session::Anonymous);
    }
}
