//! The collection registry: durable metadata, pagination, health, and the
//! confirmation-token gated delete flow.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tokio::sync::Mutex;

use crate::domain::collection::{
    config_update_job, has_obsidian_marker, validate_name, Collection, CollectionConfig,
    HealthStatus, StoredStatus,
};
use crate::domain::job::JobKind;
use crate::domain::token::ConfirmationToken;
use crate::infrastructure::database::entities::collection::{self, Entity as CollectionEntity};

use super::error::{RegistryError, RegistryResult};

fn model_to_collection(model: collection::Model) -> RegistryResult<Collection> {
    Ok(Collection {
        name: model.name,
        source_path: PathBuf::from(model.source_path),
        config: serde_json::from_str(&model.config_json)?,
        document_count: model.document_count.max(0) as u64,
        chunk_count: model.chunk_count.max(0) as u64,
        stored_status: parse_stored_status(&model.stored_status)?,
        health_status: parse_health_status(&model.health_status)?,
        last_error: model.last_error,
        created_at: model.created_at,
        updated_at: model.updated_at,
        last_indexed_at: model.last_indexed_at,
    })
}

fn parse_stored_status(s: &str) -> RegistryResult<StoredStatus> {
    Ok(match s {
        "created" => StoredStatus::Created,
        "active" => StoredStatus::Active,
        "error" => StoredStatus::Error,
        "paused" => StoredStatus::Paused,
        other => return Err(RegistryError::InvalidArgument(format!("corrupt stored_status {other}"))),
    })
}

fn stored_status_str(s: StoredStatus) -> &'static str {
    match s {
        StoredStatus::Created => "created",
        StoredStatus::Active => "active",
        StoredStatus::Error => "error",
        StoredStatus::Paused => "paused",
    }
}

fn parse_health_status(s: &str) -> RegistryResult<HealthStatus> {
    Ok(match s {
        "unknown" => HealthStatus::Unknown,
        "empty" => HealthStatus::Empty,
        "healthy" => HealthStatus::Healthy,
        "warning" => HealthStatus::Warning,
        "error" => HealthStatus::Error,
        other => return Err(RegistryError::InvalidArgument(format!("corrupt health_status {other}"))),
    })
}

fn health_status_str(s: HealthStatus) -> &'static str {
    match s {
        HealthStatus::Unknown => "unknown",
        HealthStatus::Empty => "empty",
        HealthStatus::Healthy => "healthy",
        HealthStatus::Warning => "warning",
        HealthStatus::Error => "error",
    }
}

/// Outcome a finished job reports back to the registry: deltas, not
/// absolute counts, so concurrent handlers never clobber each other.
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    pub documents_delta: i64,
    pub chunks_delta: i64,
    pub error: Option<String>,
    pub indexed_now: bool,
}

/// Implemented by `CollectionRegistry`; handed to the indexing pipeline as a
/// trait object at construction time instead of a direct struct reference,
/// so the pipeline never depends on the registry's concrete type.
#[async_trait]
pub trait ApplyJobResult: Send + Sync {
    async fn apply_job_result(&self, collection: &str, outcome: JobOutcome) -> RegistryResult<()>;
}

pub struct CollectionRegistry {
    conn: DatabaseConnection,
    /// Single-use deletion tokens, keyed by collection name. Not persisted:
    /// a crash mid-deletion-confirmation simply requires re-issuing one.
    deletion_tokens: Mutex<HashMap<String, ConfirmationToken>>,
}

impl CollectionRegistry {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn, deletion_tokens: Mutex::new(HashMap::new()) }
    }

    pub async fn create(
        &self,
        name: String,
        source_path: PathBuf,
        config: CollectionConfig,
    ) -> RegistryResult<Collection> {
        validate_name(&name)?;
        if CollectionEntity::find_by_id(&name).one(&self.conn).await?.is_some() {
            return Err(RegistryError::Conflict(name));
        }
        if !has_obsidian_marker(&source_path) {
            return Err(RegistryError::PreconditionFailed(format!(
                "{} has no .obsidian/ marker",
                source_path.display()
            )));
        }

        let now = Utc::now();
        let collection = Collection::new(name.clone(), source_path, config, now);
        let am = collection::ActiveModel {
            name: Set(collection.name.clone()),
            source_path: Set(collection.source_path.to_string_lossy().into_owned()),
            config_json: Set(serde_json::to_string(&collection.config)?),
            document_count: Set(0),
            chunk_count: Set(0),
            stored_status: Set(stored_status_str(collection.stored_status).to_string()),
            health_status: Set(health_status_str(collection.health_status).to_string()),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            last_indexed_at: Set(None),
        };
        am.insert(&self.conn).await?;
        Ok(collection)
    }

    pub async fn get(&self, name: &str) -> RegistryResult<Collection> {
        let model = CollectionEntity::find_by_id(name)
            .one(&self.conn)
            .await?
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        model_to_collection(model)
    }

    /// Paginated, ordered `updated_at DESC`.
    pub async fn list(&self, page: u64, page_size: u64) -> RegistryResult<(Vec<Collection>, u64)> {
        let paginator = CollectionEntity::find()
            .order_by_desc(collection::Column::UpdatedAt)
            .paginate(&self.conn, page_size.max(1));
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page).await?;
        let collections = models.into_iter().map(model_to_collection).collect::<RegistryResult<Vec<_>>>()?;
        Ok((collections, total))
    }

    /// Apply a config update and report which job, if any, it should
    /// schedule. The caller (the composition root) performs the actual
    /// `JobQueue::create` call, keeping the registry free of a queue handle.
    pub async fn update_config(&self, name: &str, new_config: CollectionConfig) -> RegistryResult<Option<JobKind>> {
        let model = CollectionEntity::find_by_id(name)
            .one(&self.conn)
            .await?
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let old_config: CollectionConfig = serde_json::from_str(&model.config_json)?;
        let scheduled = config_update_job(&old_config, &new_config);

        let mut am: collection::ActiveModel = model.into();
        am.config_json = Set(serde_json::to_string(&new_config)?);
        am.updated_at = Set(Utc::now());
        am.update(&self.conn).await?;
        Ok(scheduled)
    }

    pub async fn health(&self, name: &str) -> RegistryResult<HealthStatus> {
        Ok(self.get(name).await?.health_status)
    }

    pub async fn issue_deletion_token(&self, name: &str) -> RegistryResult<ConfirmationToken> {
        self.get(name).await?;
        let token = ConfirmationToken::issue(name, Utc::now());
        self.deletion_tokens.lock().await.insert(name.to_string(), token.clone());
        Ok(token)
    }

    /// Fail-closed: any mismatch, missing, expired, or already-consumed
    /// token refuses the delete. Consumes the token but does not remove the
    /// collection itself — that only happens once the `delete` job this
    /// gates has actually dropped the vector namespace (`remove_record`).
    pub async fn validate_deletion_token(&self, name: &str, confirmation_token: &str) -> RegistryResult<()> {
        self.get(name).await?;
        let mut tokens = self.deletion_tokens.lock().await;
        let valid = match tokens.get_mut(name) {
            Some(token) => token.try_consume(confirmation_token, Utc::now()),
            None => false,
        };
        if !valid {
            return Err(RegistryError::PreconditionFailed(
                "missing, expired, or already-used confirmation token".to_string(),
            ));
        }
        tokens.remove(name);
        Ok(())
    }

    /// Drop the collection's row. Only called by the `delete` job handler,
    /// after the confirmation token has already been validated at enqueue
    /// time and the vector namespace has already been dropped.
    pub async fn remove_record(&self, name: &str) -> RegistryResult<()> {
        CollectionEntity::delete_by_id(name).exec(&self.conn).await?;
        Ok(())
    }
}

#[async_trait]
impl ApplyJobResult for CollectionRegistry {
    async fn apply_job_result(&self, name: &str, outcome: JobOutcome) -> RegistryResult<()> {
        let model = CollectionEntity::find_by_id(name)
            .one(&self.conn)
            .await?
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let mut collection = model_to_collection(model.clone())?;

        collection.document_count = (collection.document_count as i64 + outcome.documents_delta).max(0) as u64;
        collection.chunk_count = (collection.chunk_count as i64 + outcome.chunks_delta).max(0) as u64;
        collection.last_error = outcome.error.clone();
        collection.stored_status = if outcome.error.is_some() { StoredStatus::Error } else { StoredStatus::Active };
        collection.refresh_health();

        let now = Utc::now();
        let mut am: collection::ActiveModel = model.into();
        am.document_count = Set(collection.document_count as i64);
        am.chunk_count = Set(collection.chunk_count as i64);
        am.last_error = Set(collection.last_error.clone());
        am.stored_status = Set(stored_status_str(collection.stored_status).to_string());
        am.health_status = Set(health_status_str(collection.health_status).to_string());
        am.updated_at = Set(now);
        if outcome.indexed_now {
            am.last_indexed_at = Set(Some(now));
        }
        am.update(&self.conn).await?;
        Ok(())
    }
}
