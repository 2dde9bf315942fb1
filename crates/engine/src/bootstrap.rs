use std::sync::Arc;

use thiserror::Error;

use greenlight_core::config::AppConfig;
use greenlight_core::notify::NotificationSink;
use greenlight_core::resolver::ChainResolver;
use greenlight_db::repositories::SqlRequestRepository;
use greenlight_db::{connect, migrations};

use crate::identity::RoleProvider;
use crate::queries::RequestQueries;
use crate::service::WorkflowService;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    Connect(#[from] sqlx::Error),
    #[error("migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// The wired engine: mutations through `service`, reads through `queries`,
/// both over the same store.
pub struct Engine {
    pub service: WorkflowService,
    pub queries: RequestQueries,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

/// Build a ready engine from config: open the pool per `[database]`, run
/// pending migrations, and thread the `[policy]` tables and `[engine]`
/// retry budget into the service. Identity and notification collaborators
/// come from the caller.
pub async fn build(
    config: &AppConfig,
    roles: Arc<dyn RoleProvider>,
    sink: Arc<dyn NotificationSink>,
) -> Result<Engine, BootstrapError> {
    let pool = connect(&config.database).await?;
    migrations::run_pending(&pool).await?;

    let repo = Arc::new(SqlRequestRepository::new(pool));
    let service = WorkflowService::new(
        repo.clone(),
        roles,
        sink,
        ChainResolver::new(config.policy.clone()),
        config.engine.max_transition_retries,
    );
    let queries = RequestQueries::new(repo);
    Ok(Engine { service, queries })
}
