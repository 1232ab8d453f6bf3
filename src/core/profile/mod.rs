//! User profile editing
//!
//! - `form` - the profile form component: state, update hooks, actions
//! - `view` - data-only description of the rendered form
//! - `ports` - persistence, storage and notification interfaces
//! - `api` - HTTP host for form sessions

pub mod api;
pub mod form;
pub mod ports;
pub mod view;

#[cfg(test)]
mod testing;

pub use api::{ProfileApiError, ProfileApiState, profile_router};
pub use form::{FieldValue, ProfileContext, ProfileError, ProfileField, ProfileForm};
pub use ports::{Notifier, StorageDisk, UserStore, UserStoreError};
pub use view::View;
