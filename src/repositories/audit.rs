use sqlx::types::Json;
use time::PrimitiveDateTime;
use uuid::Uuid;

pub(crate) struct NewAuditEntry<'a> {
    pub(crate) actor_id: &'a str,
    pub(crate) action: &'a str,
    pub(crate) entity_type: &'a str,
    pub(crate) entity_id: &'a str,
    pub(crate) metadata: serde_json::Value,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn append(
    executor: impl sqlx::PgExecutor<'_>,
    entry: NewAuditEntry<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_logs (id, actor_id, action, entity_type, entity_id, metadata, created_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(entry.actor_id)
    .bind(entry.action)
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(Json(entry.metadata))
    .bind(entry.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

