//! View description of the profile form
//!
//! The form never renders markup. It returns a tree of [`ViewNode`]s that a
//! front end turns into tabs, grids, inputs and fieldsets.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::db::models::User;
use crate::core::profile::form::ProfileField;
use crate::core::storage::{UploadPreview, UploadedFile};

pub const TEMPLATE: &str = "profile";
pub const LAYOUT: &str = "layouts.app";
pub const TITLE: &str = "Profile";

/// Action invoked by the avatar field's delete button
pub const DELETE_AVATAR_ACTION: &str = "deleteAvatar";

const GRID_TWO_COLUMNS: &str = "grid grid-cols-1 lg:grid-cols-2 gap-6";

/// What the host renders for the profile page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub template: &'static str,
    pub layout: &'static str,
    pub title: &'static str,
    pub fields: Vec<ViewNode>,
}

/// A node of the field layout tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewNode {
    Tabs { label: String, tabs: Vec<Tab> },
    Layout { class: String, children: Vec<ViewNode> },
    Field(InputField),
    Avatar(AvatarField),
    Fieldset {
        legend: String,
        class: Option<String>,
        children: Vec<ViewNode>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tab {
    pub label: String,
    pub children: Vec<ViewNode>,
}

/// Input element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Email,
    Password,
}

/// When the client sends a changed value back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Binding {
    /// On every input event
    #[default]
    Live,
    /// When the input loses focus
    Lazy,
}

/// A single-line input bound to a form field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputField {
    pub name: ProfileField,
    pub label: String,
    pub input_type: InputType,
    pub binding: Binding,
    pub attributes: BTreeMap<String, String>,
    pub hint: Option<String>,
    pub help: Option<String>,
}

impl InputField {
    pub fn new(name: ProfileField, label: impl Into<String>) -> Self {
        Self {
            name,
            label: label.into(),
            input_type: InputType::default(),
            binding: Binding::default(),
            attributes: BTreeMap::new(),
            hint: None,
            help: None,
        }
    }

    pub fn input_type(mut self, input_type: InputType) -> Self {
        self.input_type = input_type;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.binding = Binding::Lazy;
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl From<InputField> for ViewNode {
    fn from(field: InputField) -> Self {
        ViewNode::Field(field)
    }
}

/// Avatar picker with preview and delete action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvatarField {
    pub name: ProfileField,
    pub label: String,
    /// Upload staged in the form, not yet stored
    pub preview: Option<UploadPreview>,
    /// Storage path of the saved avatar
    pub current: Option<String>,
    /// Used for initials when there is no avatar
    pub user_name: String,
    pub delete_action: &'static str,
}

/// Build the field layout of the profile form
pub fn profile_fields(staged_avatar: Option<&UploadedFile>, user: &User) -> Vec<ViewNode> {
    let account = vec![
        ViewNode::Layout {
            class: GRID_TWO_COLUMNS.to_string(),
            children: vec![
                InputField::new(ProfileField::Name, "Name")
                    .attribute("required", "true")
                    .into(),
                InputField::new(ProfileField::Email, "E-Mail Address")
                    .input_type(InputType::Email)
                    .lazy()
                    .attribute("required", "true")
                    .attribute("autocomplete", "email")
                    .into(),
            ],
        },
        ViewNode::Avatar(AvatarField {
            name: ProfileField::Avatar,
            label: "User Photo".to_string(),
            preview: staged_avatar.map(UploadPreview::from),
            current: user.avatar.clone(),
            user_name: user.name.clone(),
            delete_action: DELETE_AVATAR_ACTION,
        }),
        ViewNode::Fieldset {
            legend: "Update Password".to_string(),
            class: Some(GRID_TWO_COLUMNS.to_string()),
            children: vec![
                InputField::new(ProfileField::Password, "Password")
                    .input_type(InputType::Password)
                    .attribute("autocomplete", "new-password")
                    .hint("Optional")
                    .help("Leave blank to keep current password.")
                    .into(),
                InputField::new(ProfileField::PasswordConfirmation, "Confirm New Password")
                    .input_type(InputType::Password)
                    .attribute("autocomplete", "new-password")
                    .hint("Optional")
                    .into(),
            ],
        },
    ];

    vec![ViewNode::Tabs {
        label: "Profile".to_string(),
        tabs: vec![Tab {
            label: "Account".to_string(),
            children: account,
        }],
    }]
}
