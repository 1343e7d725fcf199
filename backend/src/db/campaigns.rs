use chrono::{DateTime, Utc};
use sqlx::Result;
use uuid::Uuid;

use crate::db::models::{Campaign, CampaignStatus, NewCampaign};
use crate::db::DbPool;

const CAMPAIGN_COLUMNS: &str = "id, name, description, variant, spreadsheet_url, \
    connection_template, status, created_at, updated_at";

pub async fn insert_campaign(pool: &DbPool, new: &NewCampaign, now: DateTime<Utc>) -> Result<Campaign> {
    let campaign = Campaign {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        description: new.description.clone(),
        variant: new.variant,
        spreadsheet_url: new.spreadsheet_url.clone().filter(|u| !u.trim().is_empty()),
        connection_template: new.connection_template.clone().filter(|t| !t.trim().is_empty()),
        status: CampaignStatus::Draft,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO campaigns (
            id,
            name,
            description,
            variant,
            spreadsheet_url,
            connection_template,
            status,
            created_at,
            updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(campaign.id)
    .bind(&campaign.name)
    .bind(&campaign.description)
    .bind(campaign.variant)
    .bind(&campaign.spreadsheet_url)
    .bind(&campaign.connection_template)
    .bind(campaign.status)
    .bind(campaign.created_at)
    .bind(campaign.updated_at)
    .execute(pool)
    .await?;

    Ok(campaign)
}

pub async fn get_campaign(pool: &DbPool, id: Uuid) -> Result<Option<Campaign>> {
    sqlx::query_as::<_, Campaign>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Newest first.
pub async fn list_campaigns(pool: &DbPool) -> Result<Vec<Campaign>> {
    sqlx::query_as::<_, Campaign>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY created_at DESC, rowid DESC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn list_campaigns_by_status(
    pool: &DbPool,
    status: CampaignStatus,
) -> Result<Vec<Campaign>> {
    sqlx::query_as::<_, Campaign>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE status = ?1 ORDER BY created_at, rowid"
    ))
    .bind(status)
    .fetch_all(pool)
    .await
}

/// Only moves the campaign if it is still in `expected`; returns whether a row changed.
pub async fn update_campaign_status(
    pool: &DbPool,
    id: Uuid,
    expected: CampaignStatus,
    next: CampaignStatus,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET status = ?3,
            updated_at = ?4
        WHERE id = ?1 AND status = ?2
        "#,
    )
    .bind(id)
    .bind(expected)
    .bind(next)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a campaign together with its contacts.
pub async fn delete_campaign(pool: &DbPool, id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM contacts WHERE campaign_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM campaigns WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}
