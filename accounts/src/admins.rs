use crate::error::AccountError;
use crate::metrics_defs::LOGIN;
use crate::password::{Hasher, check_strength};
use crate::types::Admin;
use crate::users::normalize_email;
use docstore::{Collection, Store, StoreError};
use serde::Deserialize;
use shared::clock::now_secs;
use shared::counter;
use shared::pagination::{Order, Page, PageRequest};

pub const COLLECTION: &str = "admins";

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NewAdmin {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// The admin seeded from configuration when no admin exists.
pub type BootstrapAdmin = NewAdmin;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdminSortBy {
    #[default]
    CreatedAt,
    FirstName,
    Email,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdminSort {
    pub sort_by: AdminSortBy,
    pub order: Order,
}

fn email_of(admin: &Admin) -> String {
    admin.email.clone()
}

#[derive(Clone)]
pub struct Admins {
    store: Store,
    admins: Collection<Admin>,
    hasher: Hasher,
}

impl Admins {
    pub fn new(store: &Store) -> Result<Self, StoreError> {
        Ok(Admins {
            store: store.clone(),
            admins: store.collection(COLLECTION, Some(email_of))?,
            hasher: Hasher::default(),
        })
    }

    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub async fn create(&self, new: NewAdmin) -> Result<Admin, AccountError> {
        let email = normalize_email(&new.email)?;
        check_strength(&new.password)?;
        if self.admins.find_by_key(&email).is_some() {
            return Err(AccountError::AlreadyExists("admin"));
        }

        let now = now_secs();
        let admin = Admin {
            id: docstore::new_id(),
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            email,
            password_hash: self.hasher.spawn_hash(&new.password).await?,
            created_at: now,
            updated_at: now,
        };

        let mut txn = self.store.begin()?;
        match self.admins.insert(&mut txn, admin.clone()) {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => return Err(AccountError::AlreadyExists("admin")),
            Err(err) => return Err(err.into()),
        }
        txn.commit();

        tracing::info!(admin_id = %admin.id, "Created admin");
        Ok(admin)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Admin, AccountError> {
        let email = email.trim().to_lowercase();
        let verified = match self.admins.find_by_key(&email) {
            Some(admin) => {
                let matches = self.hasher.spawn_verify(password, &admin.password_hash).await?;
                matches.then_some(admin)
            }
            None => None,
        };
        let result = verified.ok_or(AccountError::InvalidCredentials);
        let outcome = if result.is_ok() { "success" } else { "failure" };
        counter!(LOGIN, "role" => "admin", "outcome" => outcome).increment(1);
        result
    }

    pub fn get(&self, id: &str) -> Result<Admin, AccountError> {
        self.admins.get(id).ok_or(AccountError::NotFound("admin"))
    }

    /// Admins whose first name, last name or email contains `search`,
    /// ignoring case.
    pub fn list(&self, search: Option<&str>, sort: AdminSort, page: PageRequest) -> Page<Admin> {
        let needle = search
            .map(|search| search.trim().to_lowercase())
            .filter(|search| !search.is_empty());
        let mut admins = self.admins.find(|admin| match &needle {
            Some(needle) => [&admin.first_name, &admin.last_name, &admin.email]
                .iter()
                .any(|field| field.to_lowercase().contains(needle.as_str())),
            None => true,
        });

        admins.sort_by(|a, b| {
            let ordering = match sort.sort_by {
                AdminSortBy::CreatedAt => a.created_at.cmp(&b.created_at),
                AdminSortBy::FirstName => a
                    .first_name
                    .to_lowercase()
                    .cmp(&b.first_name.to_lowercase()),
                AdminSortBy::Email => a.email.cmp(&b.email),
            }
            .then_with(|| a.id.cmp(&b.id));
            match sort.order {
                Order::Asc => ordering,
                Order::Desc => ordering.reverse(),
            }
        });

        Page::from_sorted(admins, page)
    }

    pub async fn change_password(
        &self,
        id: &str,
        current: &str,
        new: &str,
    ) -> Result<Admin, AccountError> {
        let admin = self.get(id)?;
        if !self.hasher.spawn_verify(current, &admin.password_hash).await? {
            return Err(AccountError::InvalidCredentials);
        }
        check_strength(new)?;
        let hash = self.hasher.spawn_hash(new).await?;

        let mut txn = self.store.begin()?;
        let admin = self
            .admins
            .update(&mut txn, id, |admin| {
                admin.password_hash = hash;
                admin.updated_at = now_secs();
            })?
            .ok_or(AccountError::NotFound("admin"))?;
        txn.commit();
        Ok(admin)
    }

    /// Creates the configured admin when there is no admin at all.
    pub async fn ensure_bootstrap(
        &self,
        bootstrap: Option<&BootstrapAdmin>,
    ) -> Result<Option<Admin>, AccountError> {
        if !self.admins.is_empty() {
            return Ok(None);
        }
        let Some(bootstrap) = bootstrap else {
            tracing::warn!("No admin exists and no bootstrap admin is configured");
            return Ok(None);
        };
        let admin = self.create(bootstrap.clone()).await?;
        tracing::info!(admin_id = %admin.id, "Seeded bootstrap admin");
        Ok(Some(admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::test_hasher;

    fn get_admins() -> Admins {
        Admins::new(&Store::new()).unwrap().with_hasher(test_hasher())
    }

    fn new_admin() -> NewAdmin {
        NewAdmin {
            first_name: "Robin".into(),
            last_name: "Doe".into(),
            email: "robin@tablemate.app".into(),
            password: "Adm1n$ecret".into(),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_once() {
        let admins = get_admins();
        assert!(admins.ensure_bootstrap(None).await.unwrap().is_none());

        let seeded = admins.ensure_bootstrap(Some(&new_admin())).await.unwrap();
        assert!(seeded.is_some());
        assert!(
            admins
                .ensure_bootstrap(Some(&new_admin()))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_list_search_and_sort() {
        let admins = get_admins();
        for (first_name, email) in [
            ("Robin", "robin@tablemate.app"),
            ("alex", "alex@tablemate.app"),
            ("Kim", "kim@example.com"),
        ] {
            admins
                .create(NewAdmin {
                    first_name: first_name.into(),
                    email: email.into(),
                    ..new_admin()
                })
                .await
                .unwrap();
        }

        let sort = AdminSort {
            sort_by: AdminSortBy::FirstName,
            order: Order::Asc,
        };
        let page = admins.list(None, sort, PageRequest::default());
        let names: Vec<&str> = page.data.iter().map(|a| a.first_name.as_str()).collect();
        assert_eq!(names, ["alex", "Kim", "Robin"]);

        let page = admins.list(Some(" TABLEMATE "), sort, PageRequest::default());
        let names: Vec<&str> = page.data.iter().map(|a| a.first_name.as_str()).collect();
        assert_eq!(names, ["alex", "Robin"]);

        // Matches the shared last name
        let page = admins.list(
            Some("doe"),
            AdminSort::default(),
            PageRequest::new(Some(1), Some(2)).unwrap(),
        );
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.pagination.total_records, 3);
        assert_eq!(page.pagination.total_pages, 2);

        assert!(admins.list(Some("nobody"), sort, PageRequest::default()).data.is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_and_change_password() {
        let admins = get_admins();
        let admin = admins.create(new_admin()).await.unwrap();

        assert_eq!(
            admins
                .authenticate("Robin@Tablemate.app", "Adm1n$ecret")
                .await
                .unwrap()
                .id,
            admin.id
        );

        let err = admins
            .change_password(&admin.id, "wrong", "N3w$ecret")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));

        admins
            .change_password(&admin.id, "Adm1n$ecret", "N3w$ecret")
            .await
            .unwrap();
        assert!(
            admins
                .authenticate("robin@tablemate.app", "Adm1n$ecret")
                .await
                .is_err()
        );
        assert!(
            admins
                .authenticate("robin@tablemate.app", "N3w$ecret")
                .await
                .is_ok()
        );
    }
}
