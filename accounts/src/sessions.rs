use crate::error::AccountError;
use crate::metrics_defs::{SESSION_OPENED, TOKEN_REFRESHED};
use crate::settings::AuthSettings;
use crate::tokens;
use crate::types::{DeviceType, Role, Session};
use docstore::{Collection, Store, StoreError};
use serde::{Deserialize, Serialize};
use shared::clock::now_secs;
use shared::counter;

pub const COLLECTION: &str = "sessions";

// Authenticated requests refresh last_active_at at most this often
const ACTIVITY_RESOLUTION_SECS: u64 = 60;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NewDevice {
    pub device_type: DeviceType,
    pub device_name: String,
    pub device_token: Option<String>,
}

/// Plain tokens handed to the client. They are not stored anywhere.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct IssuedTokens {
    pub device_id: String,
    pub access_token: String,
    pub access_expires_at: u64,
    pub refresh_token: Option<String>,
}

fn device_id_of(session: &Session) -> String {
    session.device_id.clone()
}

#[derive(Clone)]
pub struct Sessions {
    store: Store,
    sessions: Collection<Session>,
    settings: AuthSettings,
}

impl Sessions {
    pub fn new(store: &Store, settings: AuthSettings) -> Result<Self, StoreError> {
        Ok(Sessions {
            store: store.clone(),
            sessions: store.collection(COLLECTION, Some(device_id_of))?,
            settings,
        })
    }

    /// Starts a session on a new device and issues both tokens.
    pub fn open(
        &self,
        role: Role,
        principal_id: &str,
        device: NewDevice,
    ) -> Result<IssuedTokens, AccountError> {
        let now = now_secs();
        let access_token = tokens::generate();
        let refresh_token = tokens::generate();
        let access_expires_at = now + self.settings.access_token_ttl_secs;

        let session = Session {
            id: docstore::new_id(),
            device_id: docstore::new_id(),
            role,
            principal_id: principal_id.to_string(),
            device_type: device.device_type,
            device_name: device.device_name,
            device_token: device.device_token,
            access_token: Some(tokens::digest(&access_token)),
            access_expires_at: Some(access_expires_at),
            refresh_token: Some(tokens::digest(&refresh_token)),
            refresh_expires_at: Some(now + self.settings.refresh_token_ttl_secs(role)),
            is_active: true,
            last_active_at: now,
            created_at: now,
            updated_at: now,
        };

        let mut txn = self.store.begin()?;
        self.sessions.insert(&mut txn, session.clone())?;
        txn.commit();

        counter!(SESSION_OPENED, "role" => role_tag(role)).increment(1);
        tracing::debug!(%role, principal_id, device_id = %session.device_id, "Opened session");
        Ok(IssuedTokens {
            device_id: session.device_id,
            access_token,
            access_expires_at,
            refresh_token: Some(refresh_token),
        })
    }

    /// Resolves a bearer token to its active session.
    pub fn authenticate(&self, role: Role, access_token: &str) -> Result<Session, AccountError> {
        let digest = tokens::digest(access_token);
        let now = now_secs();
        let session = self
            .sessions
            .find_one(|session| {
                session.is_active
                    && session.role == role
                    && session.access_token.as_deref() == Some(digest.as_str())
                    && session.access_expires_at.is_some_and(|at| at > now)
            })
            .ok_or(AccountError::InvalidToken)?;

        if now.saturating_sub(session.last_active_at) >= ACTIVITY_RESOLUTION_SECS {
            self.touch(&session.id, now);
        }
        Ok(session)
    }

    // Best effort, never fails authentication.
    fn touch(&self, session_id: &str, now: u64) {
        if !self.store.is_open() {
            tracing::debug!(session_id, "Store closed, not recording session activity");
            return;
        }
        let touched = self.store.begin().and_then(|mut txn| {
            self.sessions.update(&mut txn, session_id, |session| {
                session.last_active_at = now;
            })?;
            txn.commit();
            Ok(())
        });
        if let Err(err) = touched {
            tracing::warn!(error = %err, session_id, "Failed to record session activity");
        }
    }

    /// Issues a new access token. Admin sessions also get a new refresh token.
    pub fn refresh(
        &self,
        role: Role,
        device_id: &str,
        refresh_token: &str,
    ) -> Result<IssuedTokens, AccountError> {
        let digest = tokens::digest(refresh_token);
        let now = now_secs();
        let is_valid = |session: &Session| {
            session.is_active
                && session.role == role
                && session.refresh_token.as_deref() == Some(digest.as_str())
                && session.refresh_expires_at.is_some_and(|at| at > now)
        };
        let session = self
            .sessions
            .find_by_key(device_id)
            .filter(|session| is_valid(session))
            .ok_or(AccountError::InvalidToken)?;

        let access_token = tokens::generate();
        let access_expires_at = now + self.settings.access_token_ttl_secs;
        let rotated = match role {
            Role::Admin => Some(tokens::generate()),
            Role::User => None,
        };
        let refresh_expires_at = now + self.settings.refresh_token_ttl_secs(role);

        let mut txn = self.store.begin()?;
        let mut valid = false;
        self.sessions.update(&mut txn, &session.id, |session| {
            // A concurrent refresh or logout may have replaced the token since the lookup
            valid = is_valid(session);
            if !valid {
                return;
            }
            session.access_token = Some(tokens::digest(&access_token));
            session.access_expires_at = Some(access_expires_at);
            if let Some(rotated) = &rotated {
                session.refresh_token = Some(tokens::digest(rotated));
                session.refresh_expires_at = Some(refresh_expires_at);
            }
            session.last_active_at = now;
            session.updated_at = now;
        })?;
        if !valid {
            txn.rollback();
            return Err(AccountError::InvalidToken);
        }
        txn.commit();

        counter!(TOKEN_REFRESHED, "role" => role_tag(role)).increment(1);
        Ok(IssuedTokens {
            device_id: session.device_id,
            access_token,
            access_expires_at,
            refresh_token: rotated,
        })
    }

    /// Logs the device out. The session is kept, its tokens are dropped.
    pub fn deactivate(&self, principal_id: &str, device_id: &str) -> Result<(), AccountError> {
        self.modify_own(principal_id, device_id, |session| {
            session.is_active = false;
            session.clear_tokens();
        })
    }

    /// Stores the push token of a device.
    pub fn update_device_token(
        &self,
        principal_id: &str,
        device_id: &str,
        device_token: &str,
    ) -> Result<(), AccountError> {
        self.modify_own(principal_id, device_id, |session| {
            session.device_token = Some(device_token.to_string());
            session.last_active_at = now_secs();
        })
    }

    fn modify_own<F>(&self, principal_id: &str, device_id: &str, apply: F) -> Result<(), AccountError>
    where
        F: FnOnce(&mut Session),
    {
        let session = self
            .sessions
            .find_by_key(device_id)
            .filter(|session| session.principal_id == principal_id)
            .ok_or(AccountError::NotFound("device"))?;

        let mut txn = self.store.begin()?;
        self.sessions.update(&mut txn, &session.id, |session| {
            apply(session);
            session.updated_at = now_secs();
        })?;
        txn.commit();
        Ok(())
    }
}

fn role_tag(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::User => "user",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_sessions(settings: AuthSettings) -> Sessions {
        Sessions::new(&Store::new(), settings).unwrap()
    }

    fn phone() -> NewDevice {
        NewDevice {
            device_type: DeviceType::Ios,
            device_name: "Sam's phone".into(),
            device_token: None,
        }
    }

    #[test]
    fn test_open_and_authenticate() {
        let sessions = get_sessions(AuthSettings::default());
        let issued = sessions.open(Role::User, "user-1", phone()).unwrap();

        let session = sessions.authenticate(Role::User, &issued.access_token).unwrap();
        assert_eq!(session.principal_id, "user-1");
        assert_eq!(session.device_id, issued.device_id);
        // Only digests are stored
        assert_ne!(session.access_token.as_deref(), Some(issued.access_token.as_str()));

        // Wrong role
        assert!(matches!(
            sessions.authenticate(Role::Admin, &issued.access_token),
            Err(AccountError::InvalidToken)
        ));
        assert!(sessions.authenticate(Role::User, "garbage").is_err());
    }

    #[test]
    fn test_expired_access_token() {
        let settings = AuthSettings {
            access_token_ttl_secs: 0,
            ..AuthSettings::default()
        };
        let sessions = get_sessions(settings);
        let issued = sessions.open(Role::User, "user-1", phone()).unwrap();
        assert!(sessions.authenticate(Role::User, &issued.access_token).is_err());

        // The refresh token still works
        let refreshed = sessions
            .refresh(Role::User, &issued.device_id, issued.refresh_token.as_deref().unwrap())
            .unwrap();
        assert_eq!(refreshed.refresh_token, None);
    }

    #[test]
    fn test_refresh() {
        let sessions = get_sessions(AuthSettings::default());
        let issued = sessions.open(Role::User, "user-1", phone()).unwrap();
        let refresh_token = issued.refresh_token.clone().unwrap();

        let refreshed = sessions
            .refresh(Role::User, &issued.device_id, &refresh_token)
            .unwrap();
        assert_ne!(refreshed.access_token, issued.access_token);
        assert!(sessions.authenticate(Role::User, &refreshed.access_token).is_ok());
        // The old access token is replaced
        assert!(sessions.authenticate(Role::User, &issued.access_token).is_err());

        assert!(
            sessions
                .refresh(Role::User, "other-device", &refresh_token)
                .is_err()
        );
    }

    #[test]
    fn test_admin_refresh_rotates() {
        let sessions = get_sessions(AuthSettings::default());
        let issued = sessions.open(Role::Admin, "admin-1", phone()).unwrap();
        let first = issued.refresh_token.unwrap();

        let refreshed = sessions.refresh(Role::Admin, &issued.device_id, &first).unwrap();
        let second = refreshed.refresh_token.unwrap();
        assert_ne!(first, second);

        assert!(sessions.refresh(Role::Admin, &issued.device_id, &first).is_err());
        assert!(sessions.refresh(Role::Admin, &issued.device_id, &second).is_ok());
    }

    #[test]
    fn test_concurrent_admin_refresh_rotates_once() {
        let sessions = get_sessions(AuthSettings::default());
        let issued = sessions.open(Role::Admin, "admin-1", phone()).unwrap();
        let refresh_token = issued.refresh_token.unwrap();
        let barrier = std::sync::Barrier::new(8);
        let (sessions, barrier) = (&sessions, &barrier);
        let (device_id, token) = (issued.device_id.as_str(), refresh_token.as_str());

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(move |_| {
                    scope.spawn(move || {
                        barrier.wait();
                        sessions.refresh(Role::Admin, device_id, token)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let rotated: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(rotated.len(), 1);
        assert!(
            results
                .iter()
                .filter(|r| r.is_err())
                .all(|r| matches!(r, Err(AccountError::InvalidToken)))
        );

        let second = rotated[0].refresh_token.as_deref().unwrap();
        assert!(sessions.refresh(Role::Admin, device_id, second).is_ok());
    }

    #[test]
    fn test_authenticate_with_closed_store() {
        let store = Store::new();
        let sessions = Sessions::new(&store, AuthSettings::default()).unwrap();
        let issued = sessions.open(Role::User, "user-1", phone()).unwrap();

        // Last activity is old enough to be refreshed
        let session = sessions.sessions.find_by_key(&issued.device_id).unwrap();
        let mut txn = store.begin().unwrap();
        sessions
            .sessions
            .update(&mut txn, &session.id, |session| session.last_active_at = 0)
            .unwrap();
        txn.commit();

        store.close();
        let session = sessions.authenticate(Role::User, &issued.access_token).unwrap();
        assert_eq!(session.principal_id, "user-1");
        let stored = sessions.sessions.find_by_key(&issued.device_id).unwrap();
        assert_eq!(stored.last_active_at, 0);
    }

    #[test]
    fn test_authenticate_records_activity() {
        let store = Store::new();
        let sessions = Sessions::new(&store, AuthSettings::default()).unwrap();
        let issued = sessions.open(Role::User, "user-1", phone()).unwrap();

        let session = sessions.sessions.find_by_key(&issued.device_id).unwrap();
        let mut txn = store.begin().unwrap();
        sessions
            .sessions
            .update(&mut txn, &session.id, |session| session.last_active_at = 0)
            .unwrap();
        txn.commit();

        sessions.authenticate(Role::User, &issued.access_token).unwrap();
        let stored = sessions.sessions.find_by_key(&issued.device_id).unwrap();
        assert!(stored.last_active_at > 0);
    }

    #[test]
    fn test_deactivate() {
        let sessions = get_sessions(AuthSettings::default());
        let issued = sessions.open(Role::User, "user-1", phone()).unwrap();

        // Only the owner can log a device out
        assert!(matches!(
            sessions.deactivate("user-2", &issued.device_id),
            Err(AccountError::NotFound("device"))
        ));

        sessions
            .update_device_token("user-1", &issued.device_id, "push-token")
            .unwrap();
        sessions.deactivate("user-1", &issued.device_id).unwrap();
        assert!(sessions.authenticate(Role::User, &issued.access_token).is_err());
        assert!(
            sessions
                .refresh(
                    Role::User,
                    &issued.device_id,
                    issued.refresh_token.as_deref().unwrap()
                )
                .is_err()
        );
    }
}
