//! Datasource records and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::schema::DataSourceConfig;
use crate::identity::{OrgRole, SignedInUser};

/// How a datasource is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceAccess {
    /// Requests go through this server.
    #[default]
    Proxy,
    /// Browsers talk to the datasource directly; never proxied.
    Direct,
}

/// A grant of query access on a datasource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataSourcePermission {
    User { user_id: i64 },
    Role { role: OrgRole },
}

/// A resolved backend target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: i64,
    pub org_id: i64,
    pub name: String,
    /// Plugin type name.
    #[serde(rename = "type")]
    pub ds_type: String,
    pub access: DataSourceAccess,
    pub url: String,
    pub basic_auth_user: Option<String>,
    #[serde(skip_serializing)]
    pub basic_auth_password: Option<String>,
    pub is_default: bool,
    pub read_only: bool,
    pub permissions: Vec<DataSourcePermission>,
}

impl DataSource {
    /// Whether `user` may query this datasource.
    ///
    /// Org admins always may. Otherwise an empty permission list grants
    /// every member of the owning org.
    pub fn allows(&self, user: &SignedInUser) -> bool {
        if user.org_role == OrgRole::Admin || self.permissions.is_empty() {
            return true;
        }
        self.permissions.iter().any(|p| match p {
            DataSourcePermission::User { user_id } => *user_id == user.user_id,
            DataSourcePermission::Role { role } => *role == user.org_role,
        })
    }
}

impl From<DataSourceConfig> for DataSource {
    fn from(c: DataSourceConfig) -> Self {
        Self {
            id: c.id,
            org_id: c.org_id,
            name: c.name,
            ds_type: c.ds_type,
            access: c.access,
            url: c.url,
            basic_auth_user: c.basic_auth_user,
            basic_auth_password: c.basic_auth_password,
            is_default: c.is_default,
            read_only: c.read_only,
            permissions: c.permissions,
        }
    }
}

/// Request to create a new datasource; the store assigns the id.
#[derive(Debug, Clone)]
pub struct AddDataSourceCommand {
    pub org_id: i64,
    pub name: String,
    pub ds_type: String,
    pub access: DataSourceAccess,
    pub url: String,
    pub is_default: bool,
    pub read_only: bool,
}

/// Errors that can occur while resolving or storing datasources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSourceError {
    #[error("access denied to datasource")]
    AccessDenied,

    #[error("datasource not found")]
    NotFound,

    #[error("datasource name {0:?} already exists")]
    NameExists(String),

    /// The id belongs to another org, or to a datasource created at runtime.
    #[error("datasource id {0} is already in use")]
    IdConflict(i64),

    #[error("datasource store error: {0}")]
    Store(String),
}

pub type DataSourceResult<T> = Result<T, DataSourceError>;


#[cfg(test)]
mod tests {
    use super::test_support::{datasource, user};
    use super::*;

    #[test]
    fn test_open_datasource_allows_members() {
        let ds = datasource(1, "prometheus");
        assert!(ds.allows(&user(5, 1, OrgRole::Viewer)));
    }

    #[test]
    fn test_restricted_datasource() {
        let mut ds = datasource(1, "prometheus");
        ds.permissions = vec![
            DataSourcePermission::User { user_id: 5 },
            DataSourcePermission::Role { role: OrgRole::Editor },
        ];

        assert!(ds.allows(&user(5, 1, OrgRole::Viewer)));
        assert!(ds.allows(&user(6, 1, OrgRole::Editor)));
        assert!(ds.allows(&user(7, 1, OrgRole::Admin)));
        assert!(!ds.allows(&user(8, 1, OrgRole::Viewer)));
    }

    #[test]
    fn test_permission_toml_forms() {
        #[derive(Deserialize)]
        struct Wrapper {
            permissions: Vec<DataSourcePermission>,
        }
        let w: Wrapper = toml::from_str(
            r#"permissions = [{ user_id = 3 }, { role = "Editor" }]"#,
        )
        .unwrap();
        assert_eq!(
            w.permissions,
            vec![
                DataSourcePermission::User { user_id: 3 },
                DataSourcePermission::Role { role: OrgRole::Editor },
            ]
        );
    }

    #[test]
    fn test_password_not_serialized() {
        let mut ds = datasource(1, "prometheus");
        ds.basic_auth_password = Some("secret".to_string());
        let json = serde_json::to_string(&ds).unwrap();
        assert!(!json.contains("secret"));
    }
}
