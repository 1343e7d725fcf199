use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Result, Sqlite};
use uuid::Uuid;

use crate::db::models::{MessageTemplate, NewTemplate, TemplateType, Variant};
use crate::db::DbPool;

const TEMPLATE_COLUMNS: &str = "id, name, variant, template_type, content, is_active, created_at";

pub async fn insert_template(
    pool: &DbPool,
    new: &NewTemplate,
    now: DateTime<Utc>,
) -> Result<MessageTemplate> {
    let template = MessageTemplate {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        variant: new.variant,
        template_type: new.template_type,
        content: new.content.clone(),
        is_active: true,
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO message_templates (
            id,
            name,
            variant,
            template_type,
            content,
            is_active,
            created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(template.id)
    .bind(&template.name)
    .bind(template.variant)
    .bind(template.template_type)
    .bind(&template.content)
    .bind(template.is_active)
    .bind(template.created_at)
    .execute(pool)
    .await?;

    Ok(template)
}

/// Active templates, newest first, optionally narrowed by type and variant.
pub async fn list_templates(
    pool: &DbPool,
    template_type: Option<TemplateType>,
    variant: Option<Variant>,
) -> Result<Vec<MessageTemplate>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {TEMPLATE_COLUMNS} FROM message_templates WHERE is_active = 1"
    ));

    if let Some(template_type) = template_type {
        qb.push(" AND template_type = ").push_bind(template_type);
    }
    if let Some(variant) = variant {
        qb.push(" AND variant = ").push_bind(variant);
    }
    qb.push(" ORDER BY created_at DESC, rowid DESC");

    qb.build_query_as::<MessageTemplate>().fetch_all(pool).await
}
