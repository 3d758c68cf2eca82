//! Session configuration loaded from environment variables.

use std::env;

use crm_api::{ApiConfig, Counterpart, Identity, Role};
use realtime::ChannelConfig;

use crate::surface::SurfaceConfig;

/// Everything one signed-in session needs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub api: ApiConfig,
    pub channel: ChannelConfig,
    pub identity: Identity,
    /// Agent assigned to a client identity, if known.
    pub assigned: Option<Counterpart>,
}

impl SessionConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CRM_API_URL`, `CRM_TOKEN` | REST boundary, see [`ApiConfig::from_env`] | |
    /// | `CRM_CHANNEL_*` | Push channel, see [`ChannelConfig::from_env`] | |
    /// | `CRM_USER_ID` | Signed-in identity id | (required) |
    /// | `CRM_USER_ROLE` | `client`, `agent` or `admin` | `client` |
    /// | `CRM_ASSIGNED_AGENT_ID` | Assigned agent of a client | (none) |
    /// | `CRM_ASSIGNED_AGENT_NAME` | Display name of that agent | `Your agent` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let api = ApiConfig::from_env()?;
        let channel = ChannelConfig::from_env(&api);
        let (identity, assigned) = identity_from(|key| env::var(key).ok())?;

        Ok(Self {
            api,
            channel,
            identity,
            assigned,
        })
    }

    /// Surface flavor for the signed-in role.
    pub fn surface_config(&self) -> SurfaceConfig {
        match self.identity.role {
            Role::Client => SurfaceConfig::client(self.assigned.clone()),
            Role::Agent | Role::Admin => SurfaceConfig::agent(),
        }
    }
}

fn identity_from<F>(lookup: F) -> Result<(Identity, Option<Counterpart>), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let id = present("CRM_USER_ID").ok_or(ConfigError::MissingUserId)?;
    let role = match present("CRM_USER_ROLE") {
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|_| ConfigError::InvalidRole(raw))?,
        None => Role::Client,
    };

    let assigned = present("CRM_ASSIGNED_AGENT_ID").map(|agent_id| {
        let name = present("CRM_ASSIGNED_AGENT_NAME").unwrap_or_else(|| "Your agent".to_string());
        Counterpart::new(agent_id, name, Role::Agent)
    });

    Ok((Identity::new(id, role), assigned))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Api(#[from] crm_api::ConfigError),

    #[error("CRM_USER_ID environment variable is required")]
    MissingUserId,

    #[error("Invalid CRM_USER_ROLE: {0}")]
    InvalidRole(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_client_with_assigned_agent() {
        let (identity, assigned) = identity_from(lookup(&[
            ("CRM_USER_ID", "c1"),
            ("CRM_ASSIGNED_AGENT_ID", "a7"),
            ("CRM_ASSIGNED_AGENT_NAME", "Dana Broker"),
        ]))
        .unwrap();

        assert_eq!(identity, Identity::client("c1"));
        let assigned = assigned.unwrap();
        assert_eq!(assigned.id, "a7");
        assert_eq!(assigned.name, "Dana Broker");
    }

    #[test]
    fn test_agent_role() {
        let (identity, assigned) =
            identity_from(lookup(&[("CRM_USER_ID", "a1"), ("CRM_USER_ROLE", "agent")])).unwrap();
        assert_eq!(identity.role, Role::Agent);
        assert!(assigned.is_none());
    }

    #[test]
    fn test_missing_user_id() {
        let err = identity_from(lookup(&[("CRM_USER_ID", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingUserId));
    }

    #[test]
    fn test_invalid_role() {
        let err =
            identity_from(lookup(&[("CRM_USER_ID", "x"), ("CRM_USER_ROLE", "owner")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRole(role) if role == "owner"));
    }

    #[test]
    fn test_surface_flavor_follows_role() {
        let api = ApiConfig::new("http://localhost/api", "token");
        let channel = ChannelConfig::from_env(&api);
        let session = SessionConfig {
            api,
            channel,
            identity: Identity::client("c1"),
            assigned: Some(Counterpart::new("a1", "Dana", Role::Agent)),
        };
        assert!(matches!(
            session.surface_config().bootstrap,
            crate::surface::BootstrapPolicy::OpenAssigned(_)
        ));

        let agent = SessionConfig {
            identity: Identity::agent("a1"),
            ..session
        };
        assert_eq!(agent.surface_config(), SurfaceConfig::agent());
    }
}
