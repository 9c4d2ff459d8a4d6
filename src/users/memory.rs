use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::async_trait;

use crate::users::{
    repo::{StoreError, UserStore, UserTransaction},
    repo_types::{NewUser, User, UserSummary},
};

/// Process-local store. Used when no DATABASE_URL is configured and in tests.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    last_id: i64,
}

impl Inner {
    fn email_taken(&self, email: &str) -> bool {
        self.users.values().any(|u| u.email == email)
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every committed row, ordered by id.
    pub fn all(&self) -> Vec<User> {
        self.lock().users.values().cloned().collect()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn consume_activation_token(&self, token: &str) -> Result<Option<i64>, StoreError> {
        let mut inner = self.lock();
        let Some(user) = inner
            .users
            .values_mut()
            .find(|u| u.activation_token.as_deref() == Some(token))
        else {
            return Ok(None);
        };
        user.email_verified = true;
        user.activation_token = None;
        Ok(Some(user.id))
    }

    async fn find_active_by_id(&self, id: i64) -> Result<Option<UserSummary>, StoreError> {
        Ok(self
            .lock()
            .users
            .get(&id)
            .filter(|u| u.email_verified)
            .map(UserSummary::from))
    }

    async fn find_active_page(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<UserSummary>, i64), StoreError> {
        let inner = self.lock();
        let active: Vec<&User> = inner.users.values().filter(|u| u.email_verified).collect();
        let page = active
            .iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|u| UserSummary::from(*u))
            .collect();
        Ok((page, active.len() as i64))
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        if let Some(stored) = self.lock().users.get_mut(&user.id) {
            stored.username = user.username.clone();
            stored.email_verified = user.email_verified;
            stored.activation_token = user.activation_token.clone();
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn UserTransaction>, StoreError> {
        Ok(Box::new(MemoryUserTransaction {
            store: self.clone(),
            pending: Vec::new(),
        }))
    }
}

/// Buffers inserts; dropping it without `commit` discards them.
pub struct MemoryUserTransaction {
    store: MemoryUserStore,
    pending: Vec<User>,
}

#[async_trait]
impl UserTransaction for MemoryUserTransaction {
    async fn insert(&mut self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.store.lock();
        if inner.email_taken(&user.email) || self.pending.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        inner.last_id += 1;
        let row = User {
            id: inner.last_id,
            username: user.username,
            email: user.email,
            password: user.password,
            email_verified: false,
            activation_token: Some(user.activation_token),
        };
        self.pending.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUserTransaction { store, pending } = *self;
        let mut inner = store.lock();
        if pending.iter().any(|u| inner.email_taken(&u.email)) {
            return Err(StoreError::DuplicateEmail);
        }
        for user in pending {
            inner.users.insert(user.id, user);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
