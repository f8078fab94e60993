//! Client credentials for the identity provider.

use crate::objects::{Grant, S3iId};
use std::fmt;

/// Credentials used to obtain tokens from the identity provider.
///
/// With both `username` and `password` set the password grant is used,
/// otherwise the client credentials grant.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: S3iId,
    pub client_secret: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(client_id: S3iId, client_secret: impl Into<String>) -> Self {
        Self {
            client_id,
            client_secret: client_secret.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_person(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn is_person(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// The grant used when no refresh token is available.
    pub fn full_grant(&self) -> Grant {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Grant::Password {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Grant::ClientCredentials,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_id() -> S3iId {
        "s3i:123e4567-e89b-12d3-a456-426614174000".parse().unwrap()
    }

    #[test]
    fn test_full_grant_selection() {
        let thing = Credentials::new(client_id(), "secret");
        assert!(!thing.is_person());
        assert_eq!(thing.full_grant(), Grant::ClientCredentials);

        let person = thing.with_person("alice", "hunter2");
        assert!(person.is_person());
        assert_eq!(
            person.full_grant(),
            Grant::Password {
                username: "alice".into(),
                password: "hunter2".into()
            }
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new(client_id(), "top-secret").with_person("alice", "hunter2");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("top-secret"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("alice"));
    }
}
