use serde::Deserialize;

const DAY: u64 = 24 * 60 * 60;

/// Token lifetimes in seconds.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AuthSettings {
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl_secs: u64,
    /// How much longer than the access token a user refresh token lives.
    #[serde(default = "default_user_refresh_grace")]
    pub user_refresh_grace_secs: u64,
    #[serde(default = "default_admin_refresh_grace")]
    pub admin_refresh_grace_secs: u64,
    #[serde(default = "default_reset_token_ttl")]
    pub reset_token_ttl_secs: u64,
}

fn default_access_token_ttl() -> u64 {
    60 * DAY
}

fn default_user_refresh_grace() -> u64 {
    4 * DAY
}

fn default_admin_refresh_grace() -> u64 {
    7 * DAY
}

fn default_reset_token_ttl() -> u64 {
    60 * 60
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            access_token_ttl_secs: default_access_token_ttl(),
            user_refresh_grace_secs: default_user_refresh_grace(),
            admin_refresh_grace_secs: default_admin_refresh_grace(),
            reset_token_ttl_secs: default_reset_token_ttl(),
        }
    }
}

impl AuthSettings {
    pub fn refresh_token_ttl_secs(&self, role: crate::Role) -> u64 {
        let grace = match role {
            crate::Role::Admin => self.admin_refresh_grace_secs,
            crate::Role::User => self.user_refresh_grace_secs,
        };
        self.access_token_ttl_secs + grace
    }
}
