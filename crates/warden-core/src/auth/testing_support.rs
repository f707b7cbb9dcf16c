use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::models::user;
use crate::store::{NewUser, StoreError, UserStore};

/// Vec-backed user store for unit tests that never touch a database.
pub struct MemoryUsers {
    users: Mutex<Vec<user::Model>>,
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<user::Model>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, id: i32) -> Result<Option<user::Model>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<user::Model, StoreError> {
        let mut users = self.users.lock().unwrap();
        let now = Utc::now().naive_utc();
        let model = user::Model {
            id: users.len() as i32 + 1,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
            created_at: now,
            updated_at: now,
        };
        users.push(model.clone());
        Ok(model)
    }
}

pub fn memory_users(users: Vec<user::Model>) -> Arc<MemoryUsers> {
    Arc::new(MemoryUsers {
        users: Mutex::new(users),
    })
}

pub fn sample_user(id: i32, username: &str) -> user::Model {
    let now = Utc::now().naive_utc();
    user::Model {
        id,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: String::new(),
        role: "user".to_string(),
        created_at: now,
        updated_at: now,
    }
}
