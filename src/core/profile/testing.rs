//! In-memory port implementations for tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::core::auth::PasswordHasher;
use crate::core::db::models::User;
use crate::core::notifications::Notification;
use crate::core::profile::form::ProfileContext;
use crate::core::profile::ports::{Notifier, StorageDisk, UserStore, UserStoreError};
use crate::core::storage::{StorageError, UploadedFile};

pub const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub fn png(size: usize) -> UploadedFile {
    let mut bytes = PNG_HEADER.to_vec();
    bytes.resize(size.max(PNG_HEADER.len()), 0);
    UploadedFile::new("avatar.png", Some("image/png"), bytes)
}

pub fn user(name: &str, email: &str) -> User {
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        avatar: None,
        password_hash: PasswordHasher::new(4).hash("original-password").unwrap(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// User store keeping records in a map
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
    saves: Mutex<usize>,
    fail_saves: Mutex<bool>,
}

impl MemoryUserStore {
    pub fn with(users: impl IntoIterator<Item = User>) -> Self {
        let store = Self::default();
        for user in users {
            store.users.lock().unwrap().insert(user.id, user);
        }
        store
    }

    pub fn get(&self, id: Uuid) -> User {
        self.users.lock().unwrap()[&id].clone()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    pub fn fail_saves(&self) {
        *self.fail_saves.lock().unwrap() = true;
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserStoreError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn email_taken(
        &self,
        email: &str,
        ignore: Option<Uuid>,
    ) -> Result<bool, UserStoreError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .any(|u| u.email == email && Some(u.id) != ignore))
    }

    async fn save(&self, user: &User) -> Result<User, UserStoreError> {
        if *self.fail_saves.lock().unwrap() {
            return Err(UserStoreError::Backend("connection reset".to_string()));
        }

        let mut users = self.users.lock().unwrap();
        if !users.contains_key(&user.id) {
            return Err(UserStoreError::NotFound);
        }
        if users
            .values()
            .any(|u| u.email == user.email && u.id != user.id)
        {
            return Err(UserStoreError::EmailAlreadyExists);
        }

        let mut saved = user.clone();
        saved.updated_at = Utc::now();
        users.insert(saved.id, saved.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(saved)
    }
}

/// Disk keeping files in a map and counting calls
#[derive(Default)]
pub struct MemoryDisk {
    files: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
}

impl MemoryDisk {
    pub fn put(&self, path: &str) {
        self.files.lock().unwrap().insert(path.to_string(), vec![1]);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    /// Every call made, as `store:<dir>` or `delete:<path>`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageDisk for MemoryDisk {
    fn name(&self) -> &str {
        "memory"
    }

    async fn store(&self, directory: &str, file: &UploadedFile) -> Result<String, StorageError> {
        self.calls.lock().unwrap().push(format!("store:{}", directory));
        let path = format!("{}/{}", directory, file.hash_name());
        self.files
            .lock()
            .unwrap()
            .insert(path.clone(), file.bytes().to_vec());
        Ok(path)
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        self.calls.lock().unwrap().push(format!("delete:{}", path));
        Ok(self.files.lock().unwrap().remove(path).is_some())
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.contains(path))
    }
}

/// Notifier recording every notification
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

/// Context wired to in-memory ports, with handles to inspect them
pub struct Harness {
    pub users: Arc<MemoryUserStore>,
    pub disk: Arc<MemoryDisk>,
    pub notifier: Arc<RecordingNotifier>,
    pub context: ProfileContext,
}

impl Harness {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        let users = Arc::new(MemoryUserStore::with(users));
        let disk = Arc::new(MemoryDisk::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let context = ProfileContext {
            users: users.clone(),
            disk: disk.clone(),
            notifier: notifier.clone(),
            hasher: PasswordHasher::new(4),
        };

        Self {
            users,
            disk,
            notifier,
            context,
        }
    }
}
