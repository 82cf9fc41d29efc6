//! User service
//!
//! Account lifecycle and authentication:
//! - registration with a duplicate-email pre-check
//! - login, issuing a signed token plus a cached session id
//! - cache-aside user listing
//! - profile, role and password updates, deletion
//!
//! The email check is a query followed by an insert, not a unique index, so
//! two simultaneous registrations with one email can both succeed.

use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, CacheLayer};
use crate::config::AdminSeedConfig;
use crate::db::{to_fields, Collection, DocumentStore, Filter, Snapshot};
use crate::models::{NewUser, Session, User, UserPatch, UserProfile, UserRole};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::TokenService;

/// Cache key of the serialized user list
pub const USERS_CACHE_KEY: &str = "users";

const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Login failed: unknown email or wrong password
    #[error("Unauthorized")]
    AuthenticationError,

    #[error("User already exists")]
    UserExists,

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Input for login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Credentials handed out by a successful login.
///
/// The token and the session are independent: the token proves identity
/// until it expires, the session id names the acting session for
/// self-service routes.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserProfile,
    pub token: String,
    pub session_id: String,
}

/// Fields a profile update may change
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
    /// Only honoured on the admin route
    pub role: Option<UserRole>,
}

/// User service for accounts, logins and sessions
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    cache: Arc<Cache>,
    tokens: Arc<TokenService>,
    session_ttl: Duration,
    list_ttl: Duration,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<Cache>, tokens: Arc<TokenService>) -> Self {
        Self {
            store,
            cache,
            tokens,
            session_ttl: DEFAULT_TTL,
            list_ttl: DEFAULT_TTL,
        }
    }

    /// Override how long sessions and the cached user list live
    pub fn with_ttls(mut self, session_ttl: Duration, list_ttl: Duration) -> Self {
        self.session_ttl = session_ttl;
        self.list_ttl = list_ttl;
        self
    }

    /// Register a member account. Returns the new user id.
    pub async fn create_user(&self, input: RegisterInput) -> Result<String, UserServiceError> {
        if self.find_by_email(&input.email).await?.is_some() {
            return Err(UserServiceError::UserExists);
        }

        let password_hash = hash_password(&input.password)?;
        let user = NewUser::new(input.email, input.username, password_hash, UserRole::Member);
        let id = self
            .store
            .insert(Collection::Users, to_fields(&user)?)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = %id, "User registered");
        Ok(id)
    }

    /// Check credentials, then issue a token and open a session
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome, UserServiceError> {
        let user = self
            .find_by_email(&input.email)
            .await?
            .ok_or(UserServiceError::AuthenticationError)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(UserServiceError::AuthenticationError);
        }

        let token = self.tokens.issue(&user.id, user.role)?;
        let session = Session::new(&user.id);
        self.cache
            .set_raw(
                &Session::cache_key(&session.id),
                session.user_id.clone(),
                self.session_ttl,
            )
            .await
            .context("Failed to store session")?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(LoginOutcome {
            user: user.profile(),
            token,
            session_id: session.id,
        })
    }

    /// User id owning `session_id`, if the session is still live
    pub async fn resolve_session(&self, session_id: &str) -> Result<Option<String>, UserServiceError> {
        let user_id = self
            .cache
            .get_raw(&Session::cache_key(session_id))
            .await
            .context("Failed to read session")?;
        Ok(user_id)
    }

    /// All users, served from cache when possible.
    ///
    /// Writes do not invalidate the cached list, so it may lag behind by up
    /// to the list TTL.
    pub async fn get_users(&self) -> Result<Vec<UserProfile>, UserServiceError> {
        let cached: Option<Vec<UserProfile>> = self
            .cache
            .get(USERS_CACHE_KEY)
            .await
            .context("Failed to read cached users")?;
        if let Some(users) = cached {
            return Ok(users);
        }

        tracing::debug!("User list cache miss");
        let users = self
            .store
            .list(Collection::Users, None)
            .await
            .context("Failed to list users")?
            .into_iter()
            .map(|doc| doc.decode::<User>().map(|user| user.profile()))
            .collect::<anyhow::Result<Vec<_>>>()?;

        self.cache
            .set(USERS_CACHE_KEY, &users, self.list_ttl)
            .await
            .context("Failed to cache users")?;
        Ok(users)
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<UserProfile, UserServiceError> {
        Ok(self.load(id).await?.profile())
    }

    /// Apply a profile update and return the stored result
    pub async fn update_user(
        &self,
        id: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile, UserServiceError> {
        self.load(id).await?;
        if let Some(email) = &update.email {
            if let Some(other) = self.find_by_email(email).await? {
                if other.id != id {
                    return Err(UserServiceError::UserExists);
                }
            }
        }

        let patch = UserPatch {
            email: update.email,
            username: update.username,
            role: update.role,
            password_hash: None,
            updated_at: Some(Utc::now()),
        };
        self.write_patch(id, &patch).await?;
        self.get_user_by_id(id).await
    }

    /// Re-hash and store a new password
    pub async fn update_user_password(
        &self,
        id: &str,
        password: &str,
    ) -> Result<(), UserServiceError> {
        let patch = UserPatch {
            password_hash: Some(hash_password(password)?),
            updated_at: Some(Utc::now()),
            ..UserPatch::default()
        };
        self.write_patch(id, &patch).await?;
        tracing::info!(user_id = %id, "Password changed");
        Ok(())
    }

    /// Delete an account. Posts and comments by the user are left in place.
    pub async fn delete_user(&self, id: &str) -> Result<(), UserServiceError> {
        let deleted = self
            .store
            .delete(Collection::Users, id)
            .await
            .context("Failed to delete user")?;
        if !deleted {
            return Err(UserServiceError::NotFound);
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Make sure the configured admin account exists and holds the admin
    /// role. Returns its id.
    pub async fn ensure_admin(&self, seed: &AdminSeedConfig) -> Result<String, UserServiceError> {
        match self.find_by_email(&seed.email).await? {
            Some(user) if user.is_admin() => Ok(user.id),
            Some(user) => {
                let patch = UserPatch {
                    role: Some(UserRole::Admin),
                    updated_at: Some(Utc::now()),
                    ..UserPatch::default()
                };
                self.write_patch(&user.id, &patch).await?;
                tracing::info!(user_id = %user.id, "Promoted configured account to admin");
                Ok(user.id)
            }
            None => {
                let password_hash = hash_password(&seed.password)?;
                let user = NewUser::new(
                    seed.email.clone(),
                    seed.username.clone(),
                    password_hash,
                    UserRole::Admin,
                );
                let id = self
                    .store
                    .insert(Collection::Users, to_fields(&user)?)
                    .await
                    .context("Failed to create admin user")?;
                tracing::info!(user_id = %id, "Created configured admin account");
                Ok(id)
            }
        }
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn load(&self, id: &str) -> Result<User, UserServiceError> {
        let snapshot = self
            .store
            .get(Collection::Users, id)
            .await
            .context("Failed to fetch user")?
            .decode::<User>()?;

        match snapshot {
            Snapshot::Found(user) => Ok(user),
            Snapshot::NotFound => Err(UserServiceError::NotFound),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        let documents = self
            .store
            .list(Collection::Users, Some(&Filter::eq("email", email)))
            .await
            .context("Failed to query users by email")?;

        match documents.into_iter().next() {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    async fn write_patch(&self, id: &str, patch: &UserPatch) -> Result<(), UserServiceError> {
        let updated = self
            .store
            .update(Collection::Users, id, to_fields(patch)?)
            .await
            .context("Failed to update user")?;
        if updated {
            Ok(())
        } else {
            Err(UserServiceError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::{create_test_pool, migrations, SqlxDocumentStore};

    struct TestContext {
        store: Arc<dyn DocumentStore>,
        cache: Arc<Cache>,
        tokens: Arc<TokenService>,
        service: UserService,
    }

    async fn setup_test_service() -> TestContext {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let store = SqlxDocumentStore::boxed(pool);
        let cache = Arc::new(Cache::Memory(MemoryCache::new()));
        let tokens = Arc::new(TokenService::new("test-secret", 3600));
        let service = UserService::new(store.clone(), cache.clone(), tokens.clone());

        TestContext {
            store,
            cache,
            tokens,
            service,
        }
    }

    async fn register(ctx: &TestContext, email: &str) -> String {
        ctx.service
            .create_user(RegisterInput::new(email, "someone", "p"))
            .await
            .expect("Failed to register")
    }

    // ========================================================================
    // Registration tests
    // ========================================================================

    #[tokio::test]
    async fn test_create_user_stores_member_with_hashed_password() {
        let ctx = setup_test_service().await;

        let id = ctx
            .service
            .create_user(RegisterInput::new("a@x.com", "a", "p"))
            .await
            .unwrap();

        let doc = ctx
            .store
            .get(Collection::Users, &id)
            .await
            .unwrap()
            .into_option()
            .unwrap();
        assert_eq!(doc.data["role"], "member");
        assert_eq!(doc.data["username"], "a");
        let stored = doc.data["password"].as_str().unwrap();
        assert_ne!(stored, "p");
        assert!(verify_password("p", stored).unwrap());
    }

    #[tokio::test]
    async fn test_create_user_duplicate_email_conflicts() {
        let ctx = setup_test_service().await;
        register(&ctx, "a@x.com").await;

        let result = ctx
            .service
            .create_user(RegisterInput::new("a@x.com", "other-name", "other-pass"))
            .await;
        assert!(matches!(result, Err(UserServiceError::UserExists)));
    }

    // ========================================================================
    // Login tests
    // ========================================================================

    #[tokio::test]
    async fn test_login_issues_token_and_session() {
        let ctx = setup_test_service().await;
        let id = register(&ctx, "a@x.com").await;

        let outcome = ctx
            .service
            .login(LoginInput::new("a@x.com", "p"))
            .await
            .expect("Failed to login");

        assert_eq!(outcome.user.id, id);
        let claims = ctx.tokens.verify(&outcome.token).unwrap();
        assert_eq!(claims.id, id);
        assert_eq!(claims.role, UserRole::Member);

        let session_user = ctx.service.resolve_session(&outcome.session_id).await.unwrap();
        assert_eq!(session_user, Some(id.clone()));

        // Stored as the raw id, not JSON
        let raw = ctx
            .cache
            .get_raw(&Session::cache_key(&outcome.session_id))
            .await
            .unwrap();
        assert_eq!(raw, Some(id));
    }

    #[tokio::test]
    async fn test_each_login_opens_a_new_session() {
        let ctx = setup_test_service().await;
        register(&ctx, "a@x.com").await;

        let first = ctx.service.login(LoginInput::new("a@x.com", "p")).await.unwrap();
        let second = ctx.service.login(LoginInput::new("a@x.com", "p")).await.unwrap();

        assert_ne!(first.session_id, second.session_id);
        assert!(ctx.service.resolve_session(&first.session_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_login_failures() {
        let ctx = setup_test_service().await;
        register(&ctx, "a@x.com").await;

        let wrong_password = ctx.service.login(LoginInput::new("a@x.com", "nope")).await;
        assert!(matches!(wrong_password, Err(UserServiceError::AuthenticationError)));

        let unknown = ctx.service.login(LoginInput::new("b@x.com", "p")).await;
        assert!(matches!(unknown, Err(UserServiceError::AuthenticationError)));
    }

    #[tokio::test]
    async fn test_session_expires_with_ttl() {
        let ctx = setup_test_service().await;
        let service = UserService::new(ctx.store.clone(), ctx.cache.clone(), ctx.tokens.clone())
            .with_ttls(Duration::from_millis(50), Duration::from_secs(60));
        register(&ctx, "a@x.com").await;

        let outcome = service.login(LoginInput::new("a@x.com", "p")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(service.resolve_session(&outcome.session_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let ctx = setup_test_service().await;
        assert_eq!(ctx.service.resolve_session("missing").await.unwrap(), None);
    }

    // ========================================================================
    // Listing tests
    // ========================================================================

    #[tokio::test]
    async fn test_get_users_strips_passwords_and_caches() {
        let ctx = setup_test_service().await;
        register(&ctx, "a@x.com").await;

        let users = ctx.service.get_users().await.unwrap();
        assert_eq!(users.len(), 1);

        let cached = ctx.cache.get_raw(USERS_CACHE_KEY).await.unwrap().unwrap();
        assert!(!cached.contains("password"));
        assert!(cached.contains("a@x.com"));
    }

    #[tokio::test]
    async fn test_get_users_serves_stale_cache() {
        let ctx = setup_test_service().await;
        register(&ctx, "a@x.com").await;
        assert_eq!(ctx.service.get_users().await.unwrap().len(), 1);

        // Not invalidated by writes
        register(&ctx, "b@x.com").await;
        assert_eq!(ctx.service.get_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_users_refreshes_after_list_ttl() {
        let ctx = setup_test_service().await;
        let service = UserService::new(ctx.store.clone(), ctx.cache.clone(), ctx.tokens.clone())
            .with_ttls(Duration::from_secs(60), Duration::from_millis(50));
        register(&ctx, "a@x.com").await;
        assert_eq!(service.get_users().await.unwrap().len(), 1);

        register(&ctx, "b@x.com").await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(service.get_users().await.unwrap().len(), 2);
    }

    // ========================================================================
    // Update and delete tests
    // ========================================================================

    #[tokio::test]
    async fn test_get_user_by_id() {
        let ctx = setup_test_service().await;
        let id = register(&ctx, "a@x.com").await;

        let user = ctx.service.get_user_by_id(&id).await.unwrap();
        assert_eq!(user.email, "a@x.com");

        let missing = ctx.service.get_user_by_id("missing").await;
        assert!(matches!(missing, Err(UserServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_user() {
        let ctx = setup_test_service().await;
        let id = register(&ctx, "a@x.com").await;
        let before = ctx.service.get_user_by_id(&id).await.unwrap();

        let updated = ctx
            .service
            .update_user(
                &id,
                ProfileUpdate {
                    username: Some("renamed".into()),
                    role: Some(UserRole::Admin),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.username, "renamed");
        assert_eq!(updated.email, "a@x.com");
        assert_eq!(updated.role, UserRole::Admin);
        assert!(updated.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn test_update_user_rejects_taken_email() {
        let ctx = setup_test_service().await;
        let id = register(&ctx, "a@x.com").await;
        register(&ctx, "b@x.com").await;

        let result = ctx
            .service
            .update_user(
                &id,
                ProfileUpdate {
                    email: Some("b@x.com".into()),
                    ..ProfileUpdate::default()
                },
            )
            .await;
        assert!(matches!(result, Err(UserServiceError::UserExists)));

        // Keeping one's own email is fine
        let same = ctx
            .service
            .update_user(
                &id,
                ProfileUpdate {
                    email: Some("a@x.com".into()),
                    ..ProfileUpdate::default()
                },
            )
            .await;
        assert!(same.is_ok());
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let ctx = setup_test_service().await;

        let result = ctx
            .service
            .update_user("missing", ProfileUpdate::default())
            .await;
        assert!(matches!(result, Err(UserServiceError::NotFound)));

        // A missing account wins over a taken email
        register(&ctx, "b@x.com").await;
        let update = ProfileUpdate {
            email: Some("b@x.com".to_string()),
            ..ProfileUpdate::default()
        };
        let result = ctx.service.update_user("missing", update).await;
        assert!(matches!(result, Err(UserServiceError::NotFound)));

        let result = ctx.service.update_user_password("missing", "x").await;
        assert!(matches!(result, Err(UserServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_password_rehashes() {
        let ctx = setup_test_service().await;
        let id = register(&ctx, "a@x.com").await;

        ctx.service.update_user_password(&id, "new-pass").await.unwrap();

        assert!(ctx.service.login(LoginInput::new("a@x.com", "p")).await.is_err());
        assert!(ctx.service.login(LoginInput::new("a@x.com", "new-pass")).await.is_ok());

        let doc = ctx.store.get(Collection::Users, &id).await.unwrap().into_option().unwrap();
        assert!(doc.data["password"].as_str().unwrap().starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let ctx = setup_test_service().await;
        let id = register(&ctx, "a@x.com").await;

        ctx.service.delete_user(&id).await.unwrap();
        assert!(matches!(
            ctx.service.get_user_by_id(&id).await,
            Err(UserServiceError::NotFound)
        ));
        assert!(matches!(
            ctx.service.delete_user(&id).await,
            Err(UserServiceError::NotFound)
        ));
    }

    // ========================================================================
    // Admin seeding tests
    // ========================================================================

    #[tokio::test]
    async fn test_ensure_admin_creates_and_is_idempotent() {
        let ctx = setup_test_service().await;
        let seed = AdminSeedConfig {
            email: "root@x.com".into(),
            username: "root".into(),
            password: "pw".into(),
        };

        let id = ctx.service.ensure_admin(&seed).await.unwrap();
        let again = ctx.service.ensure_admin(&seed).await.unwrap();
        assert_eq!(id, again);

        let outcome = ctx.service.login(LoginInput::new("root@x.com", "pw")).await.unwrap();
        assert_eq!(outcome.user.role, UserRole::Admin);
        assert_eq!(ctx.service.get_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_admin_promotes_existing_member() {
        let ctx = setup_test_service().await;
        let id = register(&ctx, "root@x.com").await;
        let seed = AdminSeedConfig {
            email: "root@x.com".into(),
            username: "root".into(),
            password: "ignored".into(),
        };

        assert_eq!(ctx.service.ensure_admin(&seed).await.unwrap(), id);
        let user = ctx.service.get_user_by_id(&id).await.unwrap();
        assert_eq!(user.role, UserRole::Admin);
    }
}
