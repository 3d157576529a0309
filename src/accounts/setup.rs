//! Provisioning of freshly signed-up accounts.
//!
//! Every new org gets a known admin, its creator is demoted to Editor, and
//! the main datasource is cloned into it as the read-only default.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::accounts::store::{AccountError, AccountStore, User};
use crate::config::ProvisioningConfig;
use crate::datasource::{AddDataSourceCommand, DataSourceAccess, DataSourceError, DataSourceStore};
use crate::events::{EventBus, EventListener, SignUpCompleted};
use crate::identity::OrgRole;

/// The user whose sign-up is never provisioned (the server admin).
const SERVER_ADMIN_ID: i64 = 1;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("could not find user: {0}")]
    UserLookup(#[source] AccountError),

    #[error("unable to add admin to Org: {0}")]
    AddAdmin(#[source] AccountError),

    #[error("unable to update user role: {0}")]
    UpdateRole(#[source] AccountError),

    #[error("could not find datasource: {0}")]
    DataSourceLookup(#[source] DataSourceError),

    #[error("unable to add datasource: {0}")]
    AddDataSource(#[source] DataSourceError),
}

/// Listener running the sign-up provisioning steps.
pub struct UserSetupService {
    accounts: Arc<dyn AccountStore>,
    datasources: Arc<dyn DataSourceStore>,
    config: ProvisioningConfig,
}

impl UserSetupService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        datasources: Arc<dyn DataSourceStore>,
        config: ProvisioningConfig,
    ) -> Self {
        Self {
            accounts,
            datasources,
            config,
        }
    }

    /// Register on the bus. Events published before this call are not seen.
    pub fn init(
        self: Arc<Self>,
        bus: &EventBus<SignUpCompleted>,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tracing::info!(
            dummy_org_admin_id = self.config.dummy_org_admin_id,
            main_datasource_id = self.config.main_datasource_id,
            "User setup service starting"
        );
        bus.add_listener(self, shutdown)
    }

    /// Provision the org of a newly signed-up user; stops at the first failure.
    pub async fn sign_up_completed(&self, event: &SignUpCompleted) -> Result<(), SetupError> {
        let user = self
            .accounts
            .get_user_by_email(&event.email)
            .await
            .map_err(SetupError::UserLookup)?;

        if user.id == SERVER_ADMIN_ID {
            return Ok(());
        }

        self.add_dummy_admin(&user).await?;
        self.remove_admin_role(&user).await?;
        self.copy_datasource(&user).await?;

        tracing::info!(user_id = user.id, org_id = user.org_id, "New account provisioned");
        Ok(())
    }

    async fn add_dummy_admin(&self, user: &User) -> Result<(), SetupError> {
        self.accounts
            .add_org_user(user.org_id, self.config.dummy_org_admin_id, OrgRole::Admin)
            .await
            .map_err(SetupError::AddAdmin)
    }

    async fn remove_admin_role(&self, user: &User) -> Result<(), SetupError> {
        self.accounts
            .update_org_user(user.org_id, user.id, OrgRole::Editor)
            .await
            .map_err(SetupError::UpdateRole)
    }

    async fn copy_datasource(&self, user: &User) -> Result<(), SetupError> {
        let source = self
            .datasources
            .get_in_org(self.config.main_datasource_org_id, self.config.main_datasource_id)
            .await
            .map_err(SetupError::DataSourceLookup)?;

        let cmd = AddDataSourceCommand {
            org_id: user.org_id,
            name: source.name,
            ds_type: source.ds_type,
            access: DataSourceAccess::Proxy,
            url: source.url,
            is_default: true,
            read_only: true,
        };
        self.datasources
            .add(cmd)
            .await
            .map(|_| ())
            .map_err(SetupError::AddDataSource)
    }
}

#[async_trait]
impl EventListener<SignUpCompleted> for UserSetupService {
    type Error = SetupError;

    fn name(&self) -> &'static str {
        "user_setup"
    }

    async fn on_event(&self, event: SignUpCompleted) -> Result<(), SetupError> {
        self.sign_up_completed(&event).await
    }
}
