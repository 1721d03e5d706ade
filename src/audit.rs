use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// One row of `audit_logs`: who did what to which resource.
#[derive(Debug)]
pub struct AuditEntry<'a> {
    pub actor: Uuid,
    pub action: &'a str,
    pub resource: &'a str,
    pub metadata: Value,
}

impl AuditEntry<'_> {
    pub async fn write(&self, pool: &DbPool) -> AppResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO audit_logs (id, user_id, action, resource, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(self.actor)
        .bind(self.action)
        .bind(self.resource)
        .bind(&self.metadata)
        .fetch_one(pool)
        .await?;
        Ok(id)
    }
}

/// Best effort: a failed audit write is logged, the caller carries on.
pub async fn record(pool: &DbPool, actor: Uuid, action: &str, resource: &str, metadata: Value) {
    let entry = AuditEntry {
        actor,
        action,
        resource,
        metadata,
    };
    match entry.write(pool).await {
        Ok(id) => tracing::debug!(audit_id = %id, action, resource, "audit recorded"),
        Err(err) => tracing::warn!(error = %err, action, resource, "audit write failed"),
    }
}
