use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Result, Sqlite};
use uuid::Uuid;

use crate::db::models::{CampaignStatus, Contact, ContactFilter, ContactStatus, NewContact, Variant};
use crate::db::DbPool;

const CONTACT_COLUMNS: &str = "id, campaign_id, linkedin_url, first_name, last_name, company, \
    job_title, status, variant, external_id, followup_attempts, connection_message, \
    followup_message, last_reply, reply_analysis, reply_analyzed_at, last_contacted_at, last_followup_at, accepted_at, replied_at, \
    created_at, updated_at, version";

/// Insert a contact in `created` status.
///
/// Returns `None` when the campaign already has a contact with this LinkedIn URL.
pub async fn insert_contact(
    pool: &DbPool,
    campaign_id: Uuid,
    new: &NewContact,
    variant: Variant,
    now: DateTime<Utc>,
) -> Result<Option<Contact>> {
    let contact = Contact {
        id: Uuid::new_v4(),
        campaign_id,
        linkedin_url: new.linkedin_url.clone(),
        first_name: new.first_name.clone(),
        last_name: new.last_name.clone(),
        company: new.company.clone(),
        job_title: new.job_title.clone(),
        status: ContactStatus::Created,
        variant,
        external_id: None,
        followup_attempts: 0,
        connection_message: None,
        followup_message: None,
        last_reply: None,
        reply_analysis: None,
        reply_analyzed_at: None,
        last_contacted_at: None,
        last_followup_at: None,
        accepted_at: None,
        replied_at: None,
        created_at: now,
        updated_at: now,
        version: 0,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO contacts (
            id,
            campaign_id,
            linkedin_url,
            first_name,
            last_name,
            company,
            job_title,
            status,
            variant,
            followup_attempts,
            created_at,
            updated_at,
            version
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11, 0)
        ON CONFLICT (campaign_id, linkedin_url) DO NOTHING
        "#,
    )
    .bind(contact.id)
    .bind(contact.campaign_id)
    .bind(&contact.linkedin_url)
    .bind(&contact.first_name)
    .bind(&contact.last_name)
    .bind(&contact.company)
    .bind(&contact.job_title)
    .bind(contact.status)
    .bind(contact.variant)
    .bind(contact.created_at)
    .bind(contact.updated_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    Ok(Some(contact))
}

pub async fn get_contact(pool: &DbPool, id: Uuid) -> Result<Option<Contact>> {
    sqlx::query_as::<_, Contact>(&format!(
        "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Contact in a campaign carrying the given automation handle.
pub async fn find_by_external_id(
    pool: &DbPool,
    campaign_id: Uuid,
    external_id: &str,
) -> Result<Option<Contact>> {
    sqlx::query_as::<_, Contact>(&format!(
        "SELECT {CONTACT_COLUMNS} FROM contacts WHERE campaign_id = ?1 AND external_id = ?2 \
         ORDER BY created_at, rowid LIMIT 1"
    ))
    .bind(campaign_id)
    .bind(external_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_linkedin_url(
    pool: &DbPool,
    campaign_id: Uuid,
    linkedin_url: &str,
) -> Result<Option<Contact>> {
    sqlx::query_as::<_, Contact>(&format!(
        "SELECT {CONTACT_COLUMNS} FROM contacts WHERE campaign_id = ?1 AND linkedin_url = ?2"
    ))
    .bind(campaign_id)
    .bind(linkedin_url)
    .fetch_optional(pool)
    .await
}

/// List contacts matching every set filter, oldest first.
pub async fn list_contacts(pool: &DbPool, filter: &ContactFilter) -> Result<Vec<Contact>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE 1 = 1"));

    if let Some(campaign_id) = filter.campaign_id {
        qb.push(" AND campaign_id = ").push_bind(campaign_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(variant) = filter.variant {
        qb.push(" AND variant = ").push_bind(variant);
    }
    if let Some(company) = filter.company.as_deref().filter(|c| !c.trim().is_empty()) {
        qb.push(" AND lower(company) LIKE ")
            .push_bind(format!("%{}%", company.trim().to_lowercase()));
    }
    qb.push(" ORDER BY created_at, rowid");

    qb.build_query_as::<Contact>().fetch_all(pool).await
}

/// Contacts of one campaign in one status, oldest first.
pub async fn list_campaign_contacts_in_status(
    pool: &DbPool,
    campaign_id: Uuid,
    status: ContactStatus,
) -> Result<Vec<Contact>> {
    list_contacts(
        pool,
        &ContactFilter {
            campaign_id: Some(campaign_id),
            status: Some(status),
            ..Default::default()
        },
    )
    .await
}

/// Every non-terminal contact that belongs to an active campaign, oldest first.
pub async fn list_followup_candidates(pool: &DbPool) -> Result<Vec<Contact>> {
    sqlx::query_as::<_, Contact>(&format!(
        r#"
        SELECT {CONTACT_COLUMNS}
        FROM contacts
        WHERE campaign_id IN (SELECT id FROM campaigns WHERE status = ?1)
          AND status NOT IN (?2, ?3)
        ORDER BY created_at, rowid
        "#
    ))
    .bind(CampaignStatus::Active)
    .bind(ContactStatus::ConnectionDeclined)
    .bind(ContactStatus::RepliedFollowup)
    .fetch_all(pool)
    .await
}

/// Contacts whose latest reply has not been analyzed yet, oldest first.
pub async fn list_unanalyzed_replies(pool: &DbPool) -> Result<Vec<Contact>> {
    sqlx::query_as::<_, Contact>(&format!(
        r#"
        SELECT {CONTACT_COLUMNS}
        FROM contacts
        WHERE last_reply IS NOT NULL AND reply_analysis IS NULL
        ORDER BY created_at, rowid
        "#
    ))
    .fetch_all(pool)
    .await
}

/// Write every mutable field of `contact` if the stored row still carries
/// `contact.version`. The stored version is bumped by one.
///
/// Returns `false` when another writer got there first.
pub async fn compare_and_set(pool: &DbPool, contact: &Contact) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE contacts
        SET status = ?3,
            external_id = ?4,
            followup_attempts = ?5,
            connection_message = ?6,
            followup_message = ?7,
            last_reply = ?8,
            reply_analysis = ?9,
            reply_analyzed_at = ?10,
            last_contacted_at = ?11,
            last_followup_at = ?12,
            accepted_at = ?13,
            replied_at = ?14,
            updated_at = ?15,
            version = version + 1
        WHERE id = ?1 AND version = ?2
        "#,
    )
    .bind(contact.id)
    .bind(contact.version)
    .bind(contact.status)
    .bind(&contact.external_id)
    .bind(contact.followup_attempts)
    .bind(&contact.connection_message)
    .bind(&contact.followup_message)
    .bind(&contact.last_reply)
    .bind(&contact.reply_analysis)
    .bind(contact.reply_analyzed_at)
    .bind(contact.last_contacted_at)
    .bind(contact.last_followup_at)
    .bind(contact.accepted_at)
    .bind(contact.replied_at)
    .bind(contact.updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
