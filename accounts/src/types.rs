use serde::{Deserialize, Serialize};
use std::fmt;

pub type ImageId = String;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::User => f.write_str("user"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Ios,
    Android,
    Web,
    Desktop,
}

/// Storage paths of one uploaded image in every rendition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedImage {
    pub original: String,
    pub small: String,
    pub medium: String,
    pub large: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserImage {
    pub id: ImageId,
    pub image: ProcessedImage,
    pub is_approved: bool,
    pub is_profile_image: bool,
}

/// Stored user account. Never serialized to clients directly, see
/// [`UserProfile`] and [`PublicUser`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub status: UserStatus,
    pub is_email_verified: bool,
    pub images: Vec<UserImage>,
    pub profile_image: Option<ProcessedImage>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires_at: Option<u64>,
    pub is_blocked: bool,
    pub blocked_reason: Option<String>,
    pub blocked_at: Option<u64>,
    pub blocked_by: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl docstore::Document for User {
    fn id(&self) -> &str {
        &self.id
    }
}

/// What a user sees of their own account, and what admins see.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub status: UserStatus,
    pub is_email_verified: bool,
    pub images: Vec<UserImage>,
    pub profile_image: Option<ProcessedImage>,
    pub is_blocked: bool,
    pub blocked_reason: Option<String>,
    pub blocked_at: Option<u64>,
    pub blocked_by: Option<String>,
    pub created_at: u64,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id.clone(),
            email: user.email.clone(),
            status: user.status,
            is_email_verified: user.is_email_verified,
            images: user.images.clone(),
            profile_image: user.profile_image.clone(),
            is_blocked: user.is_blocked,
            blocked_reason: user.blocked_reason.clone(),
            blocked_at: user.blocked_at,
            blocked_by: user.blocked_by.clone(),
            created_at: user.created_at,
        }
    }
}

/// What other users see.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub profile_image: Option<ProcessedImage>,
    /// Only approved images.
    pub images: Vec<UserImage>,
    pub created_at: u64,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        PublicUser {
            id: user.id.clone(),
            profile_image: user.profile_image.clone(),
            images: user
                .images
                .iter()
                .filter(|image| image.is_approved)
                .cloned()
                .collect(),
            created_at: user.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Admin {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: u64,
    pub updated_at: u64,
}

impl docstore::Document for Admin {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdminProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: u64,
}

impl From<&Admin> for AdminProfile {
    fn from(admin: &Admin) -> Self {
        AdminProfile {
            id: admin.id.clone(),
            first_name: admin.first_name.clone(),
            last_name: admin.last_name.clone(),
            email: admin.email.clone(),
            created_at: admin.created_at,
        }
    }
}

/// One logged in device. Token fields hold SHA-256 hex digests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub device_id: String,
    pub role: Role,
    pub principal_id: String,
    pub device_type: DeviceType,
    pub device_name: String,
    pub device_token: Option<String>,
    pub access_token: Option<String>,
    pub access_expires_at: Option<u64>,
    pub refresh_token: Option<String>,
    pub refresh_expires_at: Option<u64>,
    pub is_active: bool,
    pub last_active_at: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl docstore::Document for Session {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Session {
    pub(crate) fn clear_tokens(&mut self) {
        self.access_token = None;
        self.access_expires_at = None;
        self.refresh_token = None;
        self.refresh_expires_at = None;
    }
}
