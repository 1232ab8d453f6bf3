//! Profile form component
//!
//! Holds the transient state of one profile editing session and applies it to
//! the persisted [`User`] on submit. Field changes go through [`ProfileForm::update`],
//! which assigns the value and then runs the watcher registered for that
//! field, if any.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::auth::{HashingError, PasswordHasher};
use crate::core::db::models::User;
use crate::core::notifications::Notification;
use crate::core::profile::ports::{Notifier, StorageDisk, UserStore, UserStoreError};
use crate::core::profile::view::{self, View};
use crate::core::storage::{StorageError, UploadedFile};
use crate::core::validation::{
    FieldErrors, FieldSource, MAX_TEXT_LENGTH, Rule, RuleSet, Validation, unique_message,
};

/// Largest accepted avatar, in kilobytes
pub const MAX_AVATAR_KILOBYTES: u64 = 1024;

/// Directory on the disk where avatars are stored
pub const AVATAR_DIRECTORY: &str = "avatars";

pub const MIN_NAME_LENGTH: usize = 2;
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Inputs of the profile form, keyed the way the client names them
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum ProfileField {
    #[serde(rename = "user.name")]
    #[display("user.name")]
    Name,
    #[serde(rename = "user.email")]
    #[display("user.email")]
    Email,
    #[serde(rename = "avatar")]
    #[display("avatar")]
    Avatar,
    #[serde(rename = "password")]
    #[display("password")]
    Password,
    #[serde(rename = "password_confirmation")]
    #[display("password_confirmation")]
    PasswordConfirmation,
}

impl ProfileField {
    pub const ALL: [ProfileField; 5] = [
        ProfileField::Name,
        ProfileField::Email,
        ProfileField::Avatar,
        ProfileField::Password,
        ProfileField::PasswordConfirmation,
    ];

    /// Key used in rules and error bags
    pub const fn key(self) -> &'static str {
        match self {
            ProfileField::Name => "user.name",
            ProfileField::Email => "user.email",
            ProfileField::Avatar => "avatar",
            ProfileField::Password => "password",
            ProfileField::PasswordConfirmation => "password_confirmation",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// New value for a field
#[derive(Debug, Clone)]
pub enum FieldValue {
    Text(String),
    File(UploadedFile),
    Clear,
}

/// Field change handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Watcher {
    AvatarChanged,
    EmailChanged,
}

/// Watcher registered for a field
fn watcher(field: ProfileField) -> Option<Watcher> {
    match field {
        ProfileField::Avatar => Some(Watcher::AvatarChanged),
        ProfileField::Email => Some(Watcher::EmailChanged),
        ProfileField::Name | ProfileField::Password | ProfileField::PasswordConfirmation => None,
    }
}

/// Profile form errors
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Invalid value for field {0}")]
    InvalidValue(ProfileField),

    #[error(transparent)]
    Store(#[from] UserStoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Hashing(#[from] HashingError),
}

impl ProfileError {
    /// Field errors when this is a validation failure
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ProfileError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Services the form acts on
#[derive(Clone)]
pub struct ProfileContext {
    pub users: Arc<dyn UserStore>,
    pub disk: Arc<dyn StorageDisk>,
    pub notifier: Arc<dyn Notifier>,
    pub hasher: PasswordHasher,
}

/// State of one profile editing session
#[derive(Debug, Clone)]
pub struct ProfileForm {
    /// Working copy bound to the name and email inputs
    user: User,
    /// Record as last read from or written to the store
    persisted: User,
    avatar: Option<UploadedFile>,
    password: Option<String>,
    password_confirmation: Option<String>,
    errors: FieldErrors,
}

impl ProfileForm {
    /// Mount the form for the authenticated user
    pub fn mount(user: User) -> Self {
        tracing::debug!("Mounting profile form for user {}", user.id);

        Self {
            persisted: user.clone(),
            user,
            avatar: None,
            password: None,
            password_confirmation: None,
            errors: FieldErrors::new(),
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn staged_avatar(&self) -> Option<&UploadedFile> {
        self.avatar.as_ref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn password_confirmation(&self) -> Option<&str> {
        self.password_confirmation.as_deref()
    }

    /// Errors from the most recent validation
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Full rule set checked on submit
    pub fn rules(&self) -> RuleSet {
        RuleSet::new()
            .field(
                ProfileField::Name.key(),
                [
                    Rule::Required,
                    Rule::Min(MIN_NAME_LENGTH),
                    Rule::Max(MAX_TEXT_LENGTH),
                ],
            )
            .field(
                ProfileField::Email.key(),
                [
                    Rule::Required,
                    Rule::Email,
                    Rule::Max(MAX_TEXT_LENGTH),
                    Rule::Unique {
                        ignore: Some(self.user.id),
                    },
                ],
            )
            .field(
                ProfileField::Avatar.key(),
                [Rule::Image, Rule::MaxKilobytes(MAX_AVATAR_KILOBYTES)],
            )
            .field(
                ProfileField::Password.key(),
                [
                    Rule::RequiredWith(ProfileField::PasswordConfirmation.key()),
                    Rule::Min(MIN_PASSWORD_LENGTH),
                    Rule::Confirmed,
                ],
            )
            .field(
                ProfileField::PasswordConfirmation.key(),
                [Rule::Same(ProfileField::Password.key())],
            )
    }

    /// Assign a field, then run its watcher
    pub async fn update(
        &mut self,
        ctx: &ProfileContext,
        field: ProfileField,
        value: FieldValue,
    ) -> Result<(), ProfileError> {
        self.assign(field, value)?;

        match watcher(field) {
            Some(Watcher::AvatarChanged) => self.updated_avatar(ctx).await,
            Some(Watcher::EmailChanged) => self.updated_email(ctx).await,
            None => Ok(()),
        }
    }

    fn assign(&mut self, field: ProfileField, value: FieldValue) -> Result<(), ProfileError> {
        match (field, value) {
            (ProfileField::Name, FieldValue::Text(name)) => self.user.name = name,
            (ProfileField::Email, FieldValue::Text(email)) => self.user.email = email,
            (ProfileField::Avatar, FieldValue::File(file)) => self.avatar = Some(file),
            (ProfileField::Avatar, FieldValue::Clear) => self.avatar = None,
            (ProfileField::Password, FieldValue::Text(password)) => {
                self.password = non_empty(password)
            }
            (ProfileField::Password, FieldValue::Clear) => self.password = None,
            (ProfileField::PasswordConfirmation, FieldValue::Text(confirmation)) => {
                self.password_confirmation = non_empty(confirmation)
            }
            (ProfileField::PasswordConfirmation, FieldValue::Clear) => {
                self.password_confirmation = None
            }
            (field, _) => return Err(ProfileError::InvalidValue(field)),
        }
        Ok(())
    }

    /// Validate a newly staged avatar: image, at most [`MAX_AVATAR_KILOBYTES`]
    pub async fn updated_avatar(&mut self, ctx: &ProfileContext) -> Result<(), ProfileError> {
        let rules = self.rules().only(&[ProfileField::Avatar.key()]);
        self.validate_only(ctx, ProfileField::Avatar, &rules).await
    }

    /// Check the email is not used by another user
    pub async fn updated_email(&mut self, ctx: &ProfileContext) -> Result<(), ProfileError> {
        let rules = RuleSet::new().field(
            ProfileField::Email.key(),
            [Rule::Unique {
                ignore: Some(self.user.id),
            }],
        );
        self.validate_only(ctx, ProfileField::Email, &rules).await
    }

    /// Replace the errors of one field with the outcome of `rules`
    async fn validate_only(
        &mut self,
        ctx: &ProfileContext,
        field: ProfileField,
        rules: &RuleSet,
    ) -> Result<(), ProfileError> {
        let errors = self.check(ctx, rules).await?;
        self.errors.forget(field.key());

        if errors.is_empty() {
            return Ok(());
        }

        tracing::debug!(field = %field, "Field validation failed: {}", errors);
        self.errors.merge(errors.clone());
        Err(ProfileError::Validation(errors))
    }

    /// Run `rules`, resolving uniqueness checks against the store
    async fn check(
        &self,
        ctx: &ProfileContext,
        rules: &RuleSet,
    ) -> Result<FieldErrors, ProfileError> {
        let Validation {
            mut errors,
            deferred,
        } = rules.validate(self);

        for check in deferred {
            // the store answers email uniqueness only
            if check.field != ProfileField::Email.key() {
                continue;
            }
            if ctx.users.email_taken(&check.value, check.ignore).await? {
                errors.add(check.field.as_str(), unique_message(&check.field));
            }
        }

        Ok(errors)
    }

    /// Remove the stored avatar, if there is one.
    ///
    /// The record is saved first; the file is deleted only once the user no
    /// longer points at it.
    pub async fn delete_avatar(&mut self, ctx: &ProfileContext) -> Result<(), ProfileError> {
        let Some(path) = self.persisted.avatar.clone().filter(|p| !p.is_empty()) else {
            return Ok(());
        };

        let mut record = self.persisted.clone();
        record.avatar = None;
        let saved = ctx.users.save(&record).await.inspect_err(|e| {
            tracing::warn!("Removing avatar of user {} failed: {}", self.user.id, e);
        })?;

        self.avatar = None;
        self.user.avatar = None;
        self.user.updated_at = saved.updated_at;
        self.persisted = saved;

        match ctx.disk.delete(&path).await {
            Ok(_) => tracing::info!(
                disk = ctx.disk.name(),
                "Removed avatar {} of user {}",
                path,
                self.user.id
            ),
            Err(e) => tracing::warn!("Failed to delete avatar file {}: {}", path, e),
        }

        ctx.notifier.notify(Notification::success(
            self.user.id,
            format!("Avatar removed for {}", self.persisted.name),
        ));

        Ok(())
    }

    /// Validate everything and persist the changes.
    ///
    /// Nothing is written unless every rule passes. If the store rejects the
    /// save, a newly stored avatar file is deleted again and the form keeps
    /// its staged values.
    pub async fn submit(&mut self, ctx: &ProfileContext) -> Result<(), ProfileError> {
        let errors = self.check(ctx, &self.rules()).await?;
        if !errors.is_empty() {
            let failed: Vec<&str> = errors.fields().collect();
            tracing::debug!(
                fields = ?failed,
                "Profile validation failed for user {}",
                self.user.id
            );
            self.errors = errors.clone();
            return Err(ProfileError::Validation(errors));
        }
        self.errors.clear();

        let mut record = self.user.clone();
        if let Some(password) = &self.password {
            record.password_hash = ctx.hasher.hash(password)?;
        }

        let stored = match &self.avatar {
            Some(file) => Some(ctx.disk.store(AVATAR_DIRECTORY, file).await?),
            None => None,
        };
        if let Some(path) = &stored {
            record.avatar = Some(path.clone());
        }

        let saved = match ctx.users.save(&record).await {
            Ok(saved) => saved,
            Err(err) => {
                if let Some(path) = &stored {
                    discard_stored(ctx, path).await;
                }
                return Err(self.save_failed(err));
            }
        };

        self.user = saved.clone();
        self.persisted = saved;
        self.avatar = None;
        self.password = None;
        self.password_confirmation = None;

        tracing::info!(
            avatar_changed = stored.is_some(),
            "Saved profile of user {}",
            self.user.id
        );
        ctx.notifier
            .notify(Notification::success(self.user.id, "Profile saved!"));

        Ok(())
    }

    fn save_failed(&mut self, err: UserStoreError) -> ProfileError {
        match err {
            UserStoreError::EmailAlreadyExists => {
                let key = ProfileField::Email.key();
                let mut errors = FieldErrors::new();
                errors.add(key, unique_message(key));
                self.errors = errors.clone();
                ProfileError::Validation(errors)
            }
            other => {
                tracing::warn!("Saving profile of user {} failed: {}", self.user.id, other);
                ProfileError::Store(other)
            }
        }
    }

    /// View description for the host
    pub fn render(&self) -> View {
        View {
            template: view::TEMPLATE,
            layout: view::LAYOUT,
            title: view::TITLE,
            fields: view::profile_fields(self.avatar.as_ref(), &self.user),
        }
    }
}

impl FieldSource for ProfileForm {
    fn text(&self, field: &str) -> Option<&str> {
        match ProfileField::from_key(field)? {
            ProfileField::Name => Some(&self.user.name),
            ProfileField::Email => Some(&self.user.email),
            ProfileField::Avatar => None,
            ProfileField::Password => self.password.as_deref(),
            ProfileField::PasswordConfirmation => self.password_confirmation.as_deref(),
        }
    }

    fn file(&self, field: &str) -> Option<&UploadedFile> {
        match ProfileField::from_key(field)? {
            ProfileField::Avatar => self.avatar.as_ref(),
            _ => None,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

async fn discard_stored(ctx: &ProfileContext, path: &str) {
    match ctx.disk.delete(path).await {
        Ok(_) => tracing::debug!("Discarded stored avatar {}", path),
        Err(e) => tracing::warn!("Failed to discard stored avatar {}: {}", path, e),
    }
}
