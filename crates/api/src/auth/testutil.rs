//! Test doubles for the auth layer

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use payroll_shared::{AuxStore, MemoryBackend};
use tokio::sync::{Mutex, RwLock};

use super::error::AuthError;
use super::jwt::JwtManager;
use super::middleware::ClientInfo;
use super::password::hash_password;
use super::reset::ResetDelivery;
use super::roles::Role;
use super::service::{AuthService, AuthSettings};
use super::users::{User, UserId, UserRepository};

pub const TEST_SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";
pub const TEST_PASSWORD: &str = "Corr3ct!Horse";
pub const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
pub const REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub fn test_jwt() -> JwtManager {
    JwtManager::new(TEST_SECRET, ACCESS_TTL, REFRESH_TTL)
}

pub fn client(ip: &str) -> ClientInfo {
    ClientInfo {
        ip_address: Some(ip.to_string()),
        user_agent: Some("integration-test".to_string()),
    }
}

/// User repository backed by a map
#[derive(Default)]
pub struct InMemoryUsers {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUsers {
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn set_active(&self, id: UserId, active: bool) {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.is_active = active;
        }
    }

    pub async fn password_hash(&self, id: UserId) -> Option<String> {
        self.users
            .read()
            .await
            .get(&id)
            .map(|u| u.password_hash.clone())
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let email = email.trim().to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), AuthError> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }
}

/// Delivery that keeps tickets for the test to read
#[derive(Default)]
pub struct CapturedDelivery {
    sent: Mutex<Vec<(UserId, String)>>,
}

impl CapturedDelivery {
    pub async fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().await.clone()
    }

    pub async fn last_ticket(&self) -> Option<String> {
        self.sent.lock().await.last().map(|(_, t)| t.clone())
    }
}

#[async_trait]
impl ResetDelivery for CapturedDelivery {
    async fn deliver(&self, user: &User, ticket: &str) {
        self.sent.lock().await.push((user.id, ticket.to_string()));
    }
}

pub fn make_user(id: i64, email: &str, role: Role) -> User {
    User {
        id: UserId(id),
        email: email.to_string(),
        name: format!("User {id}"),
        password_hash: hash_password(TEST_PASSWORD).unwrap(),
        role,
        is_active: true,
        employee_id: Some(format!("EMP-{id:04}")),
    }
}

pub struct Harness {
    pub service: Arc<AuthService>,
    pub store: AuxStore,
    pub backend: MemoryBackend,
    pub users: Arc<InMemoryUsers>,
    pub delivery: Arc<CapturedDelivery>,
}

/// Auth service over in-memory doubles with two users:
/// `alice@example.com` (id 1, hr) and `bob@example.com` (id 2, employee)
pub async fn harness() -> Harness {
    let (store, backend) = AuxStore::memory();
    let users = Arc::new(InMemoryUsers::default());
    users
        .insert(make_user(1, "alice@example.com", Role::Hr))
        .await;
    users
        .insert(make_user(2, "bob@example.com", Role::Employee))
        .await;
    let delivery = Arc::new(CapturedDelivery::default());

    let service = AuthService::new(
        test_jwt(),
        users.clone(),
        store.clone(),
        delivery.clone(),
        AuthSettings::default(),
    )
    .unwrap();

    Harness {
        service: Arc::new(service),
        store,
        backend,
        users,
        delivery,
    }
}
