// src/auth/manager.rs
//! Authentication manager.
//!
//! Ties the secure channel to the session layer: opens sealed credential
//! requests, registers and logs users in, turns session cookies back into
//! users, and guards state-changing requests with CSRF tokens.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::auth::cookie::SignedCookieCodec;
use crate::auth::credentials::{CredentialHasher, CredentialStore, UserRecord};
use crate::auth::csrf::CsrfTokenService;
use crate::auth::session::{Session, SessionStore};
use crate::auth::validation::CredentialValidator;
use crate::crypto::{EncryptedEnvelope, EnvelopeCipher, KeyExchangeService};
use crate::protocol::{
    AuthResponse, Credentials, CredentialsRequest, KeyExchangeResponse, Role, SealedCredentials,
    UserView,
};
use crate::types::{CoreError, Result};
use crate::utils::{self, logging::log_security_event};

/// Methods that never change state and so skip the CSRF check
const SAFE_METHODS: [&str; 3] = ["GET", "HEAD", "OPTIONS"];

/// Result of a successful register or login
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: UserView,
    /// Signed value for the session cookie
    pub cookie: String,
    pub csrf_token: String,
}

impl AuthOutcome {
    pub fn to_response(&self, message: &str) -> AuthResponse {
        AuthResponse {
            message: message.to_string(),
            user: self.user.clone(),
            csrf_token: self.csrf_token.clone(),
        }
    }
}

/// User behind a valid, refreshed session
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: u64,
    pub username: String,
    pub role: Role,
    pub session_id: String,
}

impl fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role", &self.role)
            .field("session_id", &utils::redact(&self.session_id))
            .finish()
    }
}

/// Opened sealed request.
///
/// The cipher stays bound to the exchange key so the response can be
/// sealed back to the same client under a fresh nonce.
pub struct OpenedRequest {
    pub plaintext: Zeroizing<Vec<u8>>,
    pub cipher: EnvelopeCipher,
}

/// Authentication manager
pub struct AuthManager {
    exchanges: Arc<KeyExchangeService>,
    sessions: Arc<SessionStore>,
    csrf: Arc<CsrfTokenService>,
    cookies: SignedCookieCodec,
    users: Arc<dyn CredentialStore>,
    hasher: Arc<dyn CredentialHasher>,
    allow_plaintext_credentials: bool,
}

impl AuthManager {
    pub fn new(
        exchanges: Arc<KeyExchangeService>,
        sessions: Arc<SessionStore>,
        csrf: Arc<CsrfTokenService>,
        cookies: SignedCookieCodec,
        users: Arc<dyn CredentialStore>,
        hasher: Arc<dyn CredentialHasher>,
        allow_plaintext_credentials: bool,
    ) -> Self {
        Self {
            exchanges,
            sessions,
            csrf,
            cookies,
            users,
            hasher,
            allow_plaintext_credentials,
        }
    }

    /// Start a key exchange for a client about to send credentials
    pub fn init_exchange(&self) -> Result<KeyExchangeResponse> {
        self.exchanges.init_exchange()
    }

    /// Complete the exchange named in `sealed` and decrypt its payload
    pub fn open_sealed(&self, sealed: &SealedCredentials) -> Result<OpenedRequest> {
        let result = self
            .exchanges
            .complete_exchange(&sealed.exchange_id, &sealed.client_public_key)
            .and_then(|key| {
                let envelope = EncryptedEnvelope::from_payload(&sealed.encrypted_data)?;
                let cipher = EnvelopeCipher::new(&key);
                let plaintext = Zeroizing::new(cipher.open(&envelope)?);
                Ok(OpenedRequest { plaintext, cipher })
            });

        if let Err(e) = &result {
            log_security_event(
                "EXCHANGE_REJECTED",
                &format!("exchange {}: {}", utils::redact(&sealed.exchange_id), e),
            );
        }
        result
    }

    fn open_credentials(&self, request: &CredentialsRequest) -> Result<Credentials> {
        match request {
            CredentialsRequest::Sealed(sealed) => {
                let opened = self.open_sealed(sealed)?;
                serde_json::from_slice::<Credentials>(&opened.plaintext).map_err(|_| {
                    log_security_event("EXCHANGE_REJECTED", "sealed payload is not a credentials object");
                    CoreError::MalformedExchange("sealed payload is not a credentials object".to_string())
                })
            }
            CredentialsRequest::Plain(credentials) => {
                if self.allow_plaintext_credentials {
                    warn!("Accepting credentials sent without a key exchange");
                    Ok(credentials.clone())
                } else {
                    log_security_event("PLAINTEXT_CREDENTIALS", "credentials sent without a key exchange");
                    Err(CoreError::PlaintextCredentialsRejected)
                }
            }
        }
    }

    /// Create a user with role `user` and log them in
    pub async fn register(&self, request: &CredentialsRequest) -> Result<AuthOutcome> {
        let credentials = self.open_credentials(request)?;
        let username = CredentialValidator::username(&credentials.username)?;
        CredentialValidator::password(&credentials.password)?;

        if self.users.find_user_by_username(&username).is_some() {
            debug!("Registration refused for existing user {}", username);
            return Err(CoreError::UserExists);
        }

        let hasher = self.hasher.clone();
        let password = Zeroizing::new(credentials.password.clone());
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| CoreError::Internal(format!("hashing task failed: {}", e)))??;

        let id = self.users.insert_user(&username, &password_hash, Role::User)?;
        info!("Registered user {} with id {}", username, id);

        Ok(self.establish_session(UserRecord {
            id,
            username,
            password_hash,
            role: Role::User,
        }))
    }

    /// Check credentials and open a session.
    ///
    /// An unknown username still costs one hash verification so response
    /// timing does not reveal which usernames exist.
    pub async fn login(&self, request: &CredentialsRequest) -> Result<AuthOutcome> {
        let credentials = self.open_credentials(request)?;
        let username = CredentialValidator::username(&credentials.username)?;
        CredentialValidator::password(&credentials.password)?;

        let hasher = self.hasher.clone();
        let password = Zeroizing::new(credentials.password.clone());

        let user = match self.users.find_user_by_username(&username) {
            Some(user) => user,
            None => {
                tokio::task::spawn_blocking(move || hasher.burn(&password))
                    .await
                    .map_err(|e| CoreError::Internal(format!("hashing task failed: {}", e)))?;
                log_security_event("LOGIN_FAILED", &format!("unknown user {}", utils::sanitize_log(&username)));
                return Err(CoreError::InvalidCredentials);
            }
        };

        let stored_hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(|e| CoreError::Internal(format!("hashing task failed: {}", e)))??;

        if !matches {
            log_security_event("LOGIN_FAILED", &format!("bad password for user {}", user.id));
            return Err(CoreError::InvalidCredentials);
        }

        info!("User {} logged in", user.id);
        Ok(self.establish_session(user))
    }

    fn establish_session(&self, user: UserRecord) -> AuthOutcome {
        let session_id = self.sessions.create(user.id);
        let cookie = self.cookies.encode(&session_id);
        let csrf_token = self.csrf.issue(&session_id);

        AuthOutcome {
            user: user.view(),
            cookie,
            csrf_token,
        }
    }

    /// End the session behind `cookie`, if any; always succeeds
    pub fn logout(&self, cookie: Option<&str>) -> bool {
        match cookie.and_then(|c| self.cookies.decode(c)) {
            Some(session_id) => self.sessions.delete(&session_id),
            None => false,
        }
    }

    fn resolve_session(&self, cookie: Option<&str>) -> Result<Session> {
        let cookie = cookie.ok_or(CoreError::SessionInvalid)?;
        let session_id = self.cookies.decode(cookie).ok_or_else(|| {
            log_security_event("COOKIE_REJECTED", "session cookie signature mismatch");
            CoreError::SessionInvalid
        })?;

        self.sessions.get(&session_id).ok_or_else(|| {
            debug!("Session {} expired or unknown", utils::redact(&session_id));
            CoreError::SessionExpired
        })
    }

    fn user_for(&self, session: &Session) -> Result<UserRecord> {
        self.users.find_user_by_id(session.user_id).ok_or_else(|| {
            warn!("Session {} refers to missing user {}", utils::redact(&session.id), session.user_id);
            CoreError::SessionInvalid
        })
    }

    /// User behind `cookie` without extending the session
    pub fn current_user(&self, cookie: Option<&str>) -> Result<UserView> {
        let session = self.resolve_session(cookie)?;
        Ok(self.user_for(&session)?.view())
    }

    /// Resolve `cookie` and slide the session's expiry
    pub fn authenticate(&self, cookie: Option<&str>) -> Result<AuthenticatedUser> {
        let session = self.resolve_session(cookie)?;
        if !self.sessions.refresh(&session.id) {
            // Expired between lookup and refresh
            return Err(CoreError::SessionExpired);
        }

        let user = self.user_for(&session)?;
        Ok(AuthenticatedUser {
            id: user.id,
            username: user.username,
            role: user.role,
            session_id: session.id,
        })
    }

    pub fn require_role(user: &AuthenticatedUser, roles: &[Role]) -> Result<()> {
        if roles.contains(&user.role) {
            Ok(())
        } else {
            log_security_event("FORBIDDEN", &format!("user {} lacks role", user.id));
            Err(CoreError::Forbidden)
        }
    }

    /// Issue a fresh CSRF token for the session behind `cookie`.
    /// The session expiry is left untouched.
    pub fn issue_csrf_token(&self, cookie: Option<&str>) -> Result<String> {
        let session = self.resolve_session(cookie)?;
        self.user_for(&session)?;
        Ok(self.csrf.issue(&session.id))
    }

    /// Admit a request.
    ///
    /// Every method needs a live session. State-changing methods must also
    /// present a CSRF token of that session, which is consumed.
    pub fn guard(&self, method: &str, cookie: Option<&str>, csrf_header: Option<&str>) -> Result<AuthenticatedUser> {
        let user = self.authenticate(cookie)?;

        let safe = SAFE_METHODS.iter().any(|m| m.eq_ignore_ascii_case(method));
        if !safe {
            self.csrf.verify_and_consume(csrf_header, &user.session_id)?;
        }

        Ok(user)
    }
}
