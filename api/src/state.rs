use crate::config::Config;
use accounts::email::{EmailSender, Mailer};
use accounts::password::Hasher;
use accounts::{Admins, Sessions, Users};
use docstore::{Store, StoreError};
use ledger::{DocConnectionStore, Ledger, Participation};
use std::sync::Arc;

/// Services shared by all handlers. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub users: Users,
    pub admins: Admins,
    pub sessions: Sessions,
    pub ledger: Ledger,
    pub participation: Participation,
}

impl AppState {
    /// Registers every collection on `store`. Must be called once per store.
    pub fn new(
        store: &Store,
        config: &Config,
        email_sender: Arc<dyn EmailSender>,
    ) -> Result<Self, StoreError> {
        let mailer = Mailer::new(
            email_sender,
            config.email.from.clone(),
            config.frontend_url.clone(),
        );
        let ledger = Ledger::new(Arc::new(DocConnectionStore::new(store)?));

        Ok(AppState {
            store: store.clone(),
            users: Users::new(store, config.auth.clone(), mailer)?,
            admins: Admins::new(store)?,
            sessions: Sessions::new(store, config.auth.clone())?,
            participation: Participation::new(store, ledger.clone())?,
            ledger,
        })
    }

    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.users = self.users.with_hasher(hasher.clone());
        self.admins = self.admins.with_hasher(hasher);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.store.is_open()
    }
}
