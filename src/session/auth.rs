use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthResponse, ContentApi, User};
use crate::session::error::SessionError;
use crate::session::store::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    pub jwt: Option<String>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            jwt: None,
            is_authenticated: false,
            is_loading: true,
        }
    }
}

/// The signed-in user, kept in step with the session file and with the
/// bearer token on the API handle.
#[derive(Debug)]
pub struct AuthSession {
    state: AuthState,
    store: SessionStore,
}

impl AuthSession {
    pub fn new(store: SessionStore) -> Self {
        Self {
            state: AuthState::default(),
            store,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn user(&self) -> Option<&User> {
        self.state.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated
    }

    pub fn require_user(&self) -> Result<&User, SessionError> {
        match &self.state.user {
            Some(user) if self.state.is_authenticated => Ok(user),
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    /// Picks up a login saved by an earlier run. Returns whether one was
    /// found.
    pub async fn restore(&mut self, api: &dyn ContentApi) -> Result<bool, SessionError> {
        let stored = self.store.load_auth().await;
        self.state.is_loading = false;

        match stored? {
            Some((jwt, user)) => {
                debug!("restored session for {}", user.username);
                api.set_token(Some(jwt.clone()));
                self.set_auth(jwt, user);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn login(
        &mut self,
        api: &dyn ContentApi,
        identifier: &str,
        password: &str,
    ) -> crate::Result<User> {
        self.state.is_loading = true;
        let outcome = api.login(identifier, password).await;
        self.authenticate(api, outcome).await
    }

    pub async fn register(
        &mut self,
        api: &dyn ContentApi,
        username: &str,
        email: &str,
        password: &str,
    ) -> crate::Result<User> {
        self.state.is_loading = true;
        let outcome = api.register(username, email, password).await;
        self.authenticate(api, outcome).await
    }

    pub async fn logout(&mut self, api: &dyn ContentApi) -> Result<(), SessionError> {
        if let Some(user) = &self.state.user {
            info!("logging out {}", user.username);
        }
        self.state = AuthState {
            is_loading: false,
            ..AuthState::default()
        };
        api.set_token(None);
        self.persist().await
    }

    async fn authenticate(
        &mut self,
        api: &dyn ContentApi,
        outcome: Result<AuthResponse, ApiError>,
    ) -> crate::Result<User> {
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                self.state.is_loading = false;
                warn!("authentication failed: {}", e);
                return Err(e.into());
            }
        };

        let (jwt, user) = match response {
            AuthResponse {
                jwt: Some(jwt),
                user: Some(user),
            } if !jwt.is_empty() => (jwt, user),
            _ => {
                self.state.is_loading = false;
                return Err(SessionError::InvalidResponse.into());
            }
        };

        api.set_token(Some(jwt.clone()));
        self.set_auth(jwt, user.clone());
        self.persist().await?;
        info!("signed in as {}", user.username);
        Ok(user)
    }

    fn set_auth(&mut self, jwt: String, user: User) {
        self.state = AuthState {
            user: Some(user),
            jwt: Some(jwt),
            is_authenticated: true,
            is_loading: false,
        };
    }

    /// Writes the current state through to the store.
    async fn persist(&self) -> Result<(), SessionError> {
        match (&self.state.jwt, &self.state.user) {
            (Some(jwt), Some(user)) if self.state.is_authenticated => {
                self.store.save_auth(jwt, user).await
            }
            _ => self.store.clear_auth().await,
        }
    }
}
