use crate::email::Mailer;
use crate::error::AccountError;
use crate::metrics_defs::{LOGIN, PASSWORD_RESET_REQUESTED};
use crate::password::{Hasher, check_strength};
use crate::settings::AuthSettings;
use crate::tokens;
use crate::types::{ProcessedImage, Role, User, UserImage, UserStatus};
use docstore::{Collection, Store, StoreError};
use serde::Deserialize;
use shared::clock::now_secs;
use shared::counter;
use shared::pagination::{Order, Page, PageRequest};

pub const COLLECTION: &str = "users";

/// Fields a user update may touch. Email and password have their own flows.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct UserDetailsUpdate {
    pub status: Option<UserStatus>,
    pub is_email_verified: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct UserFilter {
    pub status: Option<UserStatus>,
    pub is_blocked: Option<bool>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    CreatedAt,
    Email,
    Status,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UserSort {
    pub sort_by: SortBy,
    pub order: Order,
}

fn email_of(user: &User) -> String {
    user.email.clone()
}

pub(crate) fn normalize_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AccountError::InvalidInput("invalid email address".into())),
    }
}

#[derive(Clone)]
pub struct Users {
    store: Store,
    users: Collection<User>,
    hasher: Hasher,
    settings: AuthSettings,
    mailer: Mailer,
}

impl Users {
    pub fn new(store: &Store, settings: AuthSettings, mailer: Mailer) -> Result<Self, StoreError> {
        Ok(Users {
            store: store.clone(),
            users: store.collection(COLLECTION, Some(email_of))?,
            hasher: Hasher::default(),
            settings,
            mailer,
        })
    }

    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub async fn create(
        &self,
        email: &str,
        password: &str,
        status: Option<UserStatus>,
    ) -> Result<User, AccountError> {
        let email = normalize_email(email)?;
        check_strength(password)?;
        if self.users.find_by_key(&email).is_some() {
            return Err(AccountError::AlreadyExists("user"));
        }

        let now = now_secs();
        let user = User {
            id: docstore::new_id(),
            email,
            password_hash: self.hasher.spawn_hash(password).await?,
            status: status.unwrap_or_default(),
            is_email_verified: false,
            images: Vec::new(),
            profile_image: None,
            password_reset_token: None,
            password_reset_expires_at: None,
            is_blocked: false,
            blocked_reason: None,
            blocked_at: None,
            blocked_by: None,
            created_at: now,
            updated_at: now,
        };

        let mut txn = self.store.begin()?;
        match self.users.insert(&mut txn, user.clone()) {
            Ok(()) => {}
            // Lost a race against a concurrent signup
            Err(StoreError::Conflict { .. }) => return Err(AccountError::AlreadyExists("user")),
            Err(err) => return Err(err.into()),
        }
        txn.commit();

        tracing::info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let result = self.check_credentials(email, password).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(AccountError::Blocked) => "blocked",
            Err(_) => "failure",
        };
        counter!(LOGIN, "role" => "user", "outcome" => outcome).increment(1);
        result
    }

    async fn check_credentials(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let email = email.trim().to_lowercase();
        let user = self
            .users
            .find_by_key(&email)
            .ok_or(AccountError::InvalidCredentials)?;
        if !self.hasher.spawn_verify(password, &user.password_hash).await? {
            return Err(AccountError::InvalidCredentials);
        }
        if user.is_blocked {
            return Err(AccountError::Blocked);
        }
        Ok(user)
    }

    pub fn get(&self, id: &str) -> Result<User, AccountError> {
        self.users.get(id).ok_or(AccountError::NotFound("user"))
    }

    /// Like [`Users::get`], but blocked users do not exist for other users.
    pub fn get_public(&self, id: &str) -> Result<User, AccountError> {
        match self.users.get(id) {
            Some(user) if !user.is_blocked => Ok(user),
            _ => Err(AccountError::NotFound("user")),
        }
    }

    pub fn list(&self, filter: &UserFilter, sort: UserSort, page: PageRequest) -> Page<User> {
        let mut users = self.users.find(|user| {
            filter.status.is_none_or(|status| user.status == status)
                && filter.is_blocked.is_none_or(|blocked| user.is_blocked == blocked)
        });

        users.sort_by(|a, b| {
            let ordering = match sort.sort_by {
                SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
                SortBy::Email => a.email.cmp(&b.email),
                SortBy::Status => a.status.as_str().cmp(b.status.as_str()),
            }
            .then_with(|| a.id.cmp(&b.id));
            match sort.order {
                Order::Asc => ordering,
                Order::Desc => ordering.reverse(),
            }
        });

        Page::from_sorted(users, page)
    }

    pub fn update_details(
        &self,
        id: &str,
        update: UserDetailsUpdate,
    ) -> Result<User, AccountError> {
        self.modify(id, |user| {
            if let Some(status) = update.status {
                user.status = status;
            }
            if let Some(verified) = update.is_email_verified {
                user.is_email_verified = verified;
            }
            Ok(())
        })
    }

    pub async fn set_password(&self, id: &str, password: &str) -> Result<User, AccountError> {
        check_strength(password)?;
        self.get(id)?;
        let hash = self.hasher.spawn_hash(password).await?;
        self.modify(id, |user| {
            user.password_hash = hash;
            user.password_reset_token = None;
            user.password_reset_expires_at = None;
            Ok(())
        })
    }

    pub fn block(&self, id: &str, reason: &str, admin_id: &str) -> Result<User, AccountError> {
        let user = self.modify(id, |user| {
            user.is_blocked = true;
            user.blocked_reason = Some(reason.to_string());
            user.blocked_at = Some(now_secs());
            user.blocked_by = Some(admin_id.to_string());
            Ok(())
        })?;
        tracing::info!(user_id = id, admin_id, "Blocked user");
        Ok(user)
    }

    pub fn unblock(&self, id: &str) -> Result<User, AccountError> {
        self.modify(id, |user| {
            user.is_blocked = false;
            user.blocked_reason = None;
            user.blocked_at = None;
            user.blocked_by = None;
            Ok(())
        })
    }

    /// Registers already processed images. New images wait for approval.
    pub fn add_images(
        &self,
        id: &str,
        images: Vec<ProcessedImage>,
    ) -> Result<User, AccountError> {
        if images.is_empty() {
            return Err(AccountError::InvalidInput("no images given".into()));
        }
        self.modify(id, |user| {
            user.images.extend(images.into_iter().map(|image| UserImage {
                id: docstore::new_id(),
                image,
                is_approved: false,
                is_profile_image: false,
            }));
            Ok(())
        })
    }

    pub fn delete_image(&self, id: &str, image_id: &str) -> Result<User, AccountError> {
        self.modify(id, |user| {
            let index = image_index(user, image_id)?;
            let removed = user.images.remove(index);
            if removed.is_profile_image {
                user.profile_image = None;
            }
            Ok(())
        })
    }

    /// Approves or rejects an image. Rejecting the profile image clears it.
    pub fn set_image_approval(
        &self,
        id: &str,
        image_id: &str,
        approved: bool,
    ) -> Result<User, AccountError> {
        self.modify(id, |user| {
            let index = image_index(user, image_id)?;
            let image = &mut user.images[index];
            image.is_approved = approved;
            if !approved && image.is_profile_image {
                image.is_profile_image = false;
                user.profile_image = None;
            }
            Ok(())
        })
    }

    pub fn make_profile_image(&self, id: &str, image_id: &str) -> Result<User, AccountError> {
        self.modify(id, |user| {
            let index = image_index(user, image_id)?;
            if !user.images[index].is_approved {
                return Err(AccountError::ImageNotApproved);
            }
            for (i, image) in user.images.iter_mut().enumerate() {
                image.is_profile_image = i == index;
            }
            user.profile_image = Some(user.images[index].image.clone());
            Ok(())
        })
    }

    /// Mails a reset link. Unknown addresses are not reported to the caller.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.users.find_by_key(&email) else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = tokens::generate();
        let digest = tokens::digest(&token);
        let ttl = self.settings.reset_token_ttl_secs;
        self.modify(&user.id, |user| {
            user.password_reset_token = Some(digest);
            user.password_reset_expires_at = Some(now_secs() + ttl);
            Ok(())
        })?;

        self.mailer
            .send_password_reset(&user.email, &token, ttl)
            .await?;
        counter!(PASSWORD_RESET_REQUESTED).increment(1);
        Ok(())
    }

    /// Sets a new password with an unexpired reset token. A token works once.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AccountError> {
        check_strength(password)?;
        let digest = tokens::digest(token);
        let now = now_secs();
        let user = self
            .users
            .find_one(|user| {
                user.password_reset_token.as_deref() == Some(digest.as_str())
                    && user.password_reset_expires_at.is_some_and(|at| at > now)
            })
            .ok_or(AccountError::InvalidToken)?;

        let hash = self.hasher.spawn_hash(password).await?;
        self.modify(&user.id, |user| {
            // Checked again, the token may have been used meanwhile
            if user.password_reset_token.as_deref() != Some(digest.as_str()) {
                return Err(AccountError::InvalidToken);
            }
            user.password_hash = hash;
            user.password_reset_token = None;
            user.password_reset_expires_at = None;
            Ok(())
        })?;
        tracing::info!(user_id = %user.id, role = %Role::User, "Password reset");
        Ok(())
    }

    /// Applies `apply` to the user in its own transaction. Nothing is written
    /// if `apply` fails.
    fn modify<F>(&self, id: &str, apply: F) -> Result<User, AccountError>
    where
        F: FnOnce(&mut User) -> Result<(), AccountError>,
    {
        let mut txn = self.store.begin()?;
        let mut outcome = Ok(());
        let user = self
            .users
            .update(&mut txn, id, |user| {
                outcome = apply(user);
                user.updated_at = now_secs();
            })?
            .ok_or(AccountError::NotFound("user"))?;
        if let Err(err) = outcome {
            txn.rollback();
            return Err(err);
        }
        txn.commit();
        Ok(user)
    }
}

fn image_index(user: &User, image_id: &str) -> Result<usize, AccountError> {
    user.images
        .iter()
        .position(|image| image.id == image_id)
        .ok_or(AccountError::NotFound("image"))
}
