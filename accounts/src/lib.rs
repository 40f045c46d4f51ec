//! User and admin accounts, device sessions and password resets.

pub mod email;
mod admins;
mod error;
mod metrics_defs;
pub mod password;
mod sessions;
mod settings;
pub mod tokens;
mod types;
mod users;

pub use admins::{AdminSort, AdminSortBy, Admins, BootstrapAdmin, NewAdmin};
pub use error::AccountError;
pub use metrics_defs::ALL_METRICS;
pub use sessions::{IssuedTokens, NewDevice, Sessions};
pub use settings::AuthSettings;
pub use types::{
    Admin, AdminProfile, DeviceType, ImageId, ProcessedImage, PublicUser, Role, Session, User,
    UserImage, UserProfile, UserStatus,
};
pub use users::{SortBy, UserDetailsUpdate, UserFilter, UserSort, Users};
