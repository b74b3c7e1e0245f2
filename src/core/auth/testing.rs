//! Test doubles shared by the auth, users and orders test suites

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::core::auth::clock::{Clock, ManualClock};
use crate::core::auth::jwt::{JwtConfig, JwtService};
use crate::core::auth::password::PasswordHasher;
use crate::core::auth::revocation::{InMemoryTtlStore, RevocationError, RevocationStore, TtlStore};
use crate::core::auth::service::{AuthService, UserLookup};
use crate::core::config::RevocationFailurePolicy;
use crate::core::db::models::{Role, User};
use crate::core::db::repositories::UserRepositoryError;

pub const PASSWORD: &str = "correct horse";

/// In-memory user table
#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<Vec<User>>,
}

impl MemoryUsers {
    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }

    pub fn modify(&self, id: Uuid, f: impl FnOnce(&mut User)) {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            f(user);
        }
    }

    pub fn remove(&self, id: Uuid) {
        self.users.lock().unwrap().retain(|u| u.id != id);
    }
}

#[async_trait]
impl UserLookup for MemoryUsers {
    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| u.username == identifier)
            .or_else(|| users.iter().find(|u| u.email == identifier))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }
}

/// Backend whose every call fails, standing in for an unreachable Redis
pub struct UnavailableStore;

#[async_trait]
impl TtlStore for UnavailableStore {
    async fn set_with_ttl(&self, _key: &str, _ttl: i64) -> Result<(), RevocationError> {
        Err(RevocationError::Unavailable("connection refused".to_string()))
    }

    async fn exists(&self, _key: &str) -> Result<bool, RevocationError> {
        Err(RevocationError::Unavailable("connection refused".to_string()))
    }
}

pub fn fast_hasher() -> PasswordHasher {
    PasswordHasher::with_cost(4)
}

pub fn make_user(username: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        full_name: None,
        password_hash: fast_hasher().hash(PASSWORD).unwrap(),
        role,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Auth service over in-memory users with a client `alice` and an admin `root`
pub struct AuthFixture {
    pub service: AuthService,
    pub users: Arc<MemoryUsers>,
    pub clock: ManualClock,
    /// Backend of the default revocation store
    pub memory_store: InMemoryTtlStore,
    pub client: User,
    pub admin: User,
}

impl AuthFixture {
    pub fn new() -> Self {
        Self::with_store(None, RevocationFailurePolicy::FailClosed)
    }

    /// Fixture whose revocation store always fails
    pub fn unavailable_store(policy: RevocationFailurePolicy) -> Self {
        Self::with_store(Some(RevocationStore::new(Arc::new(UnavailableStore))), policy)
    }

    fn with_store(revocations: Option<RevocationStore>, policy: RevocationFailurePolicy) -> Self {
        let clock = ManualClock::new(Utc::now());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let jwt = JwtService::with_clock(
            JwtConfig::new("access-secret", "refresh-secret"),
            shared.clone(),
        );
        let memory_store = InMemoryTtlStore::new(shared);
        let revocations =
            revocations.unwrap_or_else(|| RevocationStore::new(Arc::new(memory_store.clone())));

        let users = Arc::new(MemoryUsers::default());
        let client = make_user("alice", Role::Client);
        let admin = make_user("root", Role::Admin);
        users.insert(client.clone());
        users.insert(admin.clone());

        let service =
            AuthService::new(users.clone(), jwt, revocations, policy).with_hasher(fast_hasher());
        Self {
            service,
            users,
            clock,
            memory_store,
            client,
            admin,
        }
    }

    /// Access token for `alice`
    pub async fn client_token(&self) -> String {
        self.service.login("alice", PASSWORD).await.unwrap().access_token
    }

    /// Access token for `root`
    pub async fn admin_token(&self) -> String {
        self.service.login("root", PASSWORD).await.unwrap().access_token
    }
}
