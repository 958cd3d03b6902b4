//! # 内存管理后端插件
//!
//! 与 SQL 后端同契约的进程内实现：完整的用户/密钥管理。
//! 供测试和单机评估使用，进程退出即丢失。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bcrypt::{DEFAULT_COST, hash, verify};

use crate::error::{ProxyError, Result};
use crate::plugin::{BackendPlugin, GatewayPlugin, ManagementPlugin};
use crate::types::{JsonMap, Key, User};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Debug, Clone)]
struct StoredKey {
    key: Key,
    owner: String,
}

/// 内存管理后端
#[derive(Debug)]
pub struct MemoryBackendPlugin {
    users: RwLock<HashMap<String, StoredUser>>,
    keys: RwLock<HashMap<String, StoredKey>>,
    bcrypt_cost: u32,
}

impl Default for MemoryBackendPlugin {
    fn default() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
            bcrypt_cost: DEFAULT_COST,
        }
    }
}

impl MemoryBackendPlugin {
    fn hash_password(&self, password: &str) -> Result<String> {
        hash(password, self.bcrypt_cost)
            .map_err(|e| ProxyError::internal_with_source("密码哈希失败", e))
    }
}

#[async_trait]
impl GatewayPlugin for MemoryBackendPlugin {
    fn default_config(&self) -> JsonMap {
        let mut defaults = JsonMap::new();
        defaults.insert(
            "bcrypt_cost".to_string(),
            serde_json::Value::from(u64::from(DEFAULT_COST)),
        );
        defaults
    }

    async fn configure(&mut self, config: JsonMap) -> Result<()> {
        if let Some(cost) = config.get("bcrypt_cost").and_then(|v| v.as_u64()) {
            self.bcrypt_cost = u32::try_from(cost)
                .map_err(|e| ProxyError::config_with_source("bcrypt_cost 超出范围", e))?;
        }
        Ok(())
    }

    fn as_backend(self: Arc<Self>) -> Option<Arc<dyn BackendPlugin>> {
        Some(self)
    }

    fn as_management(self: Arc<Self>) -> Option<Arc<dyn ManagementPlugin>> {
        Some(self)
    }
}

#[async_trait]
impl BackendPlugin for MemoryBackendPlugin {
    async fn get_key(&self, key_id: &str, key_type: &str) -> Result<Option<Key>> {
        let keys = self.keys.read().unwrap();
        Ok(keys
            .get(key_id)
            .filter(|stored| stored.key.key_type == key_type)
            .map(|stored| stored.key.clone()))
    }
}

#[async_trait]
impl ManagementPlugin for MemoryBackendPlugin {
    async fn add_user(&self, email: &str, password: &str, user: &User) -> Result<User> {
        let password_hash = self.hash_password(password)?;
        let mut users = self.users.write().unwrap();
        if users.contains_key(email) {
            return Err(ProxyError::abort(
                400,
                "A user with that email already exists.",
            ));
        }

        let mut stored = user.clone();
        stored.email = email.to_string();
        stored.active = false;
        users.insert(
            email.to_string(),
            StoredUser {
                user: stored.clone(),
                password_hash,
            },
        );
        Ok(stored)
    }

    async fn get_user(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().unwrap();
        Ok(users.get(email).map(|stored| stored.user.clone()))
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let stored = {
            let users = self.users.read().unwrap();
            users.get(email).cloned()
        };
        let Some(stored) = stored else {
            return Ok(None);
        };
        if !stored.user.active {
            return Ok(None);
        }
        let matches = verify(password, &stored.password_hash)
            .map_err(|e| ProxyError::internal_with_source("密码校验失败", e))?;
        Ok(matches.then_some(stored.user))
    }

    async fn activate_user(&self, email: &str) -> Result<()> {
        let mut users = self.users.write().unwrap();
        let stored = users
            .get_mut(email)
            .ok_or_else(|| ProxyError::abort(404, "User not found."))?;
        stored.user.active = true;
        Ok(())
    }

    async fn reset_password(&self, email: &str, new_password: &str) -> Result<()> {
        let password_hash = self.hash_password(new_password)?;
        let mut users = self.users.write().unwrap();
        let stored = users
            .get_mut(email)
            .ok_or_else(|| ProxyError::abort(404, "User not found."))?;
        stored.password_hash = password_hash;
        Ok(())
    }

    async fn update_user(&self, email: &str, user: &User) -> Result<()> {
        let mut users = self.users.write().unwrap();
        let stored = users
            .get_mut(email)
            .ok_or_else(|| ProxyError::abort(404, "User not found."))?;
        stored.user.name = user.name.clone();
        stored.user.profile = user.profile.clone();
        Ok(())
    }

    async fn add_key(&self, email: &str, key: &Key) -> Result<()> {
        {
            let users = self.users.read().unwrap();
            if !users.contains_key(email) {
                return Err(ProxyError::abort(404, "User not found."));
            }
        }
        let mut keys = self.keys.write().unwrap();
        keys.insert(
            key.id.clone(),
            StoredKey {
                key: key.clone(),
                owner: email.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_key(&self, email: &str, key_id: &str) -> Result<()> {
        let mut keys = self.keys.write().unwrap();
        let stored = keys
            .get(key_id)
            .ok_or_else(|| ProxyError::abort(404, "Key does not exist."))?;
        if stored.owner != email {
            return Err(ProxyError::abort(403, "You are not the owner of this key."));
        }
        keys.remove(key_id);
        Ok(())
    }

    async fn get_all_keys(&self, email: &str) -> Result<Vec<Key>> {
        let keys = self.keys.read().unwrap();
        Ok(keys
            .values()
            .filter(|stored| stored.owner == email)
            .map(|stored| stored.key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_backend() -> MemoryBackendPlugin {
        MemoryBackendPlugin {
            bcrypt_cost: 4,
            ..Default::default()
        }
    }

    fn test_user(email: &str) -> User {
        User {
            email: email.to_string(),
            name: "Dev".to_string(),
            admin: false,
            active: false,
            profile: JsonMap::new(),
        }
    }

    #[tokio::test]
    async fn user_lifecycle_inactive_then_active() {
        let backend = test_backend();
        let user = test_user("dev@example.org");

        let created = backend
            .add_user("dev@example.org", "hunter2", &user)
            .await
            .unwrap();
        assert!(!created.active);

        // 未激活不能认证
        let authed = backend
            .authenticate("dev@example.org", "hunter2")
            .await
            .unwrap();
        assert!(authed.is_none());

        backend.activate_user("dev@example.org").await.unwrap();
        let authed = backend
            .authenticate("dev@example.org", "hunter2")
            .await
            .unwrap();
        assert!(authed.is_some());

        // 错误密码仍被拒绝
        let authed = backend
            .authenticate("dev@example.org", "wrong")
            .await
            .unwrap();
        assert!(authed.is_none());
    }

    #[tokio::test]
    async fn profile_update_and_password_reset() {
        let backend = test_backend();
        backend
            .add_user("dev@example.org", "old-pw", &test_user("dev@example.org"))
            .await
            .unwrap();
        backend.activate_user("dev@example.org").await.unwrap();

        let mut updated = test_user("dev@example.org");
        updated.name = "Renamed".to_string();
        updated
            .profile
            .insert("team".into(), serde_json::json!("platform"));
        backend.update_user("dev@example.org", &updated).await.unwrap();

        let fetched = backend.get_user("dev@example.org").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Renamed");
        assert_eq!(fetched.profile["team"], "platform");

        backend
            .reset_password("dev@example.org", "new-pw")
            .await
            .unwrap();
        assert!(
            backend
                .authenticate("dev@example.org", "old-pw")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            backend
                .authenticate("dev@example.org", "new-pw")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let backend = test_backend();
        let user = test_user("dup@example.org");
        backend
            .add_user("dup@example.org", "pw", &user)
            .await
            .unwrap();
        assert!(backend.add_user("dup@example.org", "pw", &user).await.is_err());
    }

    #[tokio::test]
    async fn key_crud_respects_ownership() {
        let backend = test_backend();
        backend
            .add_user("a@example.org", "pw", &test_user("a@example.org"))
            .await
            .unwrap();
        backend
            .add_user("b@example.org", "pw", &test_user("b@example.org"))
            .await
            .unwrap();

        let key = Key {
            id: "k-1".into(),
            key_type: "HMAC".into(),
            realm: String::new(),
            quota: "default".into(),
            data: JsonMap::new(),
        };
        backend.add_key("a@example.org", &key).await.unwrap();

        let found = backend.get_key("k-1", "HMAC").await.unwrap();
        assert_eq!(found.unwrap().id, "k-1");
        // 类型不匹配视为不存在
        assert!(backend.get_key("k-1", "Token").await.unwrap().is_none());

        assert_eq!(backend.get_all_keys("a@example.org").await.unwrap().len(), 1);
        assert!(backend.get_all_keys("b@example.org").await.unwrap().is_empty());

        // 非所有者删除被拒绝
        assert!(backend.delete_key("b@example.org", "k-1").await.is_err());
        backend.delete_key("a@example.org", "k-1").await.unwrap();
        assert!(backend.get_key("k-1", "HMAC").await.unwrap().is_none());
    }
}
