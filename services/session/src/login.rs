//! Login and registration: authenticate credentials against a user
//! directory, then hand out a session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2,
};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::crypto::UserId;
use crate::error::SessionError;
use crate::session::{CookieDirective, CredentialIssuer, CredentialPair};

/// Stored credentials for one account.
#[derive(Clone, PartialEq, Eq)]
pub struct UserCredentials {
    /// Account identifier
    pub id: UserId,
    /// Password hash, interpreted by a [`PasswordVerifier`]
    pub password_hash: String,
    /// Assigned role
    pub role_id: i64,
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("id", &self.id)
            .field("password_hash", &"<redacted>")
            .field("role_id", &self.role_id)
            .finish()
    }
}

/// A role as stored by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    /// Role identifier
    pub id: i64,
    /// Display name
    pub name: String,
}

/// Account to be created; the password is already hashed.
#[derive(Clone)]
pub struct NewAccount {
    /// Display name
    pub display_name: String,
    /// Login email
    pub email: String,
    /// Password hash
    pub password_hash: String,
}

/// Failure reported by a [`UserDirectory`] backend.
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// Email is already registered
    #[error("account already exists")]
    AccountExists,

    /// Backend failed
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

/// Account storage consulted at login and registration.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Credentials for `email`, or `None` if no such account exists.
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, DirectoryError>;

    /// Role assigned to newly registered accounts.
    async fn default_role(&self) -> Result<Role, DirectoryError>;

    /// Persist `account` with `role_id` and return its identifier.
    async fn create_account(&self, account: NewAccount, role_id: i64) -> Result<UserId, DirectoryError>;
}

/// Password hashing failure.
#[derive(Error, Debug)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(pub String);

/// Hashes passwords and checks candidates against stored hashes.
pub trait PasswordVerifier: Send + Sync {
    /// Whether `password` matches `hash`.
    fn verify(&self, password: &str, hash: &str) -> bool;

    /// Hash `password` for storage.
    ///
    /// # Errors
    ///
    /// Returns [`PasswordError`] if the hasher fails.
    fn hash(&self, password: &str) -> Result<String, PasswordError>;
}

/// Argon2id with default parameters, stored as PHC strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Passwords;

impl PasswordVerifier for Argon2Passwords {
    fn verify(&self, password: &str, hash: &str) -> bool {
        PasswordHash::new(hash).is_ok_and(|parsed| {
            argon2::PasswordVerifier::verify_password(&Argon2::default(), password.as_bytes(), &parsed).is_ok()
        })
    }

    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError(e.to_string()))
    }
}

struct StoredAccount {
    credentials: UserCredentials,
    display_name: String,
}

/// Process-local [`UserDirectory`]. Accounts live as long as the process.
pub struct MemoryDirectory {
    default_role: Role,
    next_id: AtomicI64,
    accounts: RwLock<HashMap<String, StoredAccount>>,
}

impl MemoryDirectory {
    /// Empty directory assigning `default_role` to new accounts.
    #[must_use]
    pub fn new(default_role: Role) -> Self {
        Self {
            default_role,
            next_id: AtomicI64::new(1),
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Display name of the account with `email`.
    #[must_use]
    pub fn display_name(&self, email: &str) -> Option<String> {
        self.accounts
            .read()
            .ok()?
            .get(&email.to_lowercase())
            .map(|a| a.display_name.clone())
    }
}

impl std::fmt::Debug for MemoryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDirectory")
            .field("default_role", &self.default_role)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, DirectoryError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| DirectoryError::Unavailable("account table poisoned".to_string()))?;
        Ok(accounts.get(&email.to_lowercase()).map(|a| a.credentials.clone()))
    }

    async fn default_role(&self) -> Result<Role, DirectoryError> {
        Ok(self.default_role.clone())
    }

    async fn create_account(&self, account: NewAccount, role_id: i64) -> Result<UserId, DirectoryError> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| DirectoryError::Unavailable("account table poisoned".to_string()))?;
        let key = account.email.to_lowercase();
        if accounts.contains_key(&key) {
            return Err(DirectoryError::AccountExists);
        }

        let id = UserId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        accounts.insert(
            key,
            StoredAccount {
                credentials: UserCredentials {
                    id,
                    password_hash: account.password_hash,
                    role_id,
                },
                display_name: account.display_name,
            },
        );
        Ok(id)
    }
}

/// Login errors.
#[derive(Error, Debug)]
pub enum LoginError {
    /// Unknown account or wrong password; indistinguishable on purpose
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Password and its confirmation differ
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Directory backend failed or refused the account
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Password could not be hashed
    #[error(transparent)]
    Password(#[from] PasswordError),

    /// Tokens could not be issued
    #[error("session issuance failed: {0}")]
    Internal(#[from] SessionError),
}

/// Result of a successful login or registration.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    /// Authenticated account
    pub user_id: UserId,
    /// Role of the account
    pub role_id: i64,
    /// Issued tokens
    pub pair: CredentialPair,
    /// Cookies to write with the response
    pub directives: [CookieDirective; 2],
}

/// Authenticates credentials and issues sessions.
pub struct LoginService<D, P> {
    directory: D,
    passwords: P,
    issuer: Arc<CredentialIssuer>,
}

impl<D: UserDirectory, P: PasswordVerifier> LoginService<D, P> {
    /// Create a login service.
    pub const fn new(directory: D, passwords: P, issuer: Arc<CredentialIssuer>) -> Self {
        Self {
            directory,
            passwords,
            issuer,
        }
    }

    /// The backing directory.
    pub const fn directory(&self) -> &D {
        &self.directory
    }

    /// Authenticate `email`/`password` and issue a session.
    ///
    /// # Errors
    ///
    /// [`LoginError::InvalidCredentials`] for an unknown account or a wrong
    /// password, otherwise a backend or issuance failure.
    pub async fn login(&self, email: &str, password: &str, remember: bool) -> Result<LoginGrant, LoginError> {
        let Some(credentials) = self.directory.find_credentials(email).await? else {
            warn!("Login attempt for unknown account");
            return Err(LoginError::InvalidCredentials);
        };

        if !self.passwords.verify(password, &credentials.password_hash) {
            warn!("Login attempt with wrong password");
            return Err(LoginError::InvalidCredentials);
        }

        let grant = self.grant(credentials.id, credentials.role_id, remember)?;
        info!(remember, "User logged in");
        Ok(grant)
    }

    /// Create an account with the default role and issue its first session.
    ///
    /// # Errors
    ///
    /// [`LoginError::PasswordMismatch`] if `confirmation` differs from
    /// `password`, otherwise a hashing, backend or issuance failure.
    pub async fn sign_up(
        &self,
        display_name: &str,
        email: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<LoginGrant, LoginError> {
        if password != confirmation {
            return Err(LoginError::PasswordMismatch);
        }

        let role = self.directory.default_role().await?;
        let account = NewAccount {
            display_name: display_name.to_string(),
            email: email.to_string(),
            password_hash: self.passwords.hash(password)?,
        };
        let user_id = self.directory.create_account(account, role.id).await?;

        self.register(user_id, role.id)
    }

    /// Issue the first session of an account created with `role_id`.
    /// Registration never selects the long refresh tier.
    ///
    /// # Errors
    ///
    /// An issuance failure.
    pub fn register(&self, user_id: UserId, role_id: i64) -> Result<LoginGrant, LoginError> {
        let grant = self.grant(user_id, role_id, false)?;
        info!(role_id, "User registered");
        Ok(grant)
    }

    fn grant(&self, user_id: UserId, role_id: i64, remember: bool) -> Result<LoginGrant, LoginError> {
        let pair = self.issuer.issue_login_pair(user_id, remember)?;
        let directives = self.issuer.build_session_directives(&pair, remember);
        Ok(LoginGrant {
            user_id,
            role_id,
            pair,
            directives,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::IdentifierCodec;
    use crate::jwt::{Lifetimes, RefreshTier, TokenClass, TokenCodec};
    use crate::session::CookieSettings;

    struct DownDirectory;

    #[async_trait]
    impl UserDirectory for DownDirectory {
        async fn find_credentials(&self, _email: &str) -> Result<Option<UserCredentials>, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }

        async fn default_role(&self) -> Result<Role, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }

        async fn create_account(&self, _account: NewAccount, _role_id: i64) -> Result<UserId, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }
    }

    fn issuer() -> Arc<CredentialIssuer> {
        Arc::new(CredentialIssuer::new(
            TokenCodec::new(b"access-secret", b"refresh-secret").unwrap(),
            IdentifierCodec::new(b"0123456789abcdef0123456789abcdef").unwrap(),
            Lifetimes::default(),
            CookieSettings::default(),
        ))
    }

    fn member() -> Role {
        Role {
            id: 3,
            name: "user".to_string(),
        }
    }

    async fn service_with_ada() -> LoginService<MemoryDirectory, Argon2Passwords> {
        let service = LoginService::new(MemoryDirectory::new(member()), Argon2Passwords, issuer());
        service
            .sign_up("Ada", "ada@example.com", "hunter22", "hunter22")
            .await
            .unwrap();
        service
    }

    #[tokio::test]
    async fn test_login_success() {
        let service = service_with_ada().await;
        let grant = service.login("ada@example.com", "hunter22", true).await.unwrap();

        assert_eq!(grant.user_id, UserId::new(1));
        assert_eq!(grant.role_id, 3);
        assert_eq!(grant.pair.tier, RefreshTier::Remember);
        assert_eq!(grant.directives[0].value, grant.pair.access.token.as_str());
        assert_eq!(grant.directives[1].max_age, 604_800);

        let resolved = service
            .issuer
            .resolve(TokenClass::Refresh, grant.pair.refresh.token.as_str())
            .unwrap();
        assert_eq!(resolved, UserId::new(1));
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_alike() {
        let service = service_with_ada().await;
        let unknown = service.login("nobody@example.com", "hunter22", false).await.unwrap_err();
        let wrong = service.login("ada@example.com", "wrong", false).await.unwrap_err();

        assert!(matches!(unknown, LoginError::InvalidCredentials));
        assert!(matches!(wrong, LoginError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn test_register_keeps_assigned_role_and_session_tier() {
        let service = LoginService::new(MemoryDirectory::new(member()), Argon2Passwords, issuer());
        let grant = service.register(UserId::new(7), 9).unwrap();

        assert_eq!(grant.user_id, UserId::new(7));
        assert_eq!(grant.role_id, 9);
        assert_eq!(grant.pair.tier, RefreshTier::Session);
        assert_eq!(grant.directives[1].max_age, 86_400);
    }

    #[tokio::test]
    async fn test_sign_up_assigns_default_role_and_stores_hash() {
        let service = LoginService::new(MemoryDirectory::new(member()), Argon2Passwords, issuer());
        let grant = service
            .sign_up("Grace", "grace@example.com", "cobol-1959", "cobol-1959")
            .await
            .unwrap();

        assert_eq!(grant.role_id, 3);
        assert_eq!(grant.pair.tier, RefreshTier::Session);

        let stored = service
            .directory()
            .find_credentials("grace@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, grant.user_id);
        assert_eq!(stored.role_id, 3);
        assert_ne!(stored.password_hash, "cobol-1959");
        assert_eq!(service.directory().display_name("grace@example.com").as_deref(), Some("Grace"));
    }

    #[tokio::test]
    async fn test_sign_up_rejects_mismatch_and_duplicates() {
        let service = service_with_ada().await;

        assert!(matches!(
            service.sign_up("Bob", "bob@example.com", "one", "two").await,
            Err(LoginError::PasswordMismatch)
        ));
        assert!(matches!(
            service.sign_up("Ada", "ADA@example.com", "x", "x").await,
            Err(LoginError::Directory(DirectoryError::AccountExists))
        ));
    }

    #[tokio::test]
    async fn test_directory_failure_propagates() {
        let service = LoginService::new(DownDirectory, Argon2Passwords, issuer());
        let err = service.login("ada@example.com", "hunter22", false).await.unwrap_err();
        assert!(matches!(err, LoginError::Directory(DirectoryError::Unavailable(_))));
    }

    #[test]
    fn test_argon2_round_trip() {
        let hash = Argon2Passwords.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(Argon2Passwords.verify("correct horse", &hash));
        assert!(!Argon2Passwords.verify("battery staple", &hash));
        assert!(!Argon2Passwords.verify("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn test_credentials_debug_redacts_hash() {
        let creds = UserCredentials {
            id: UserId::new(1),
            password_hash: "$argon2id$v=19$abcdef".to_string(),
            role_id: 1,
        };
        assert!(!format!("{creds:?}").contains("abcdef"));
    }
}
