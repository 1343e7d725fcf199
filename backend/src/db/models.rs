use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Where a contact is in the outreach lifecycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ContactStatus {
    Created,
    InvitationSent,
    InvitationAccepted,
    RepliedConnectionRequest,
    RepliedFollowup,
    ConnectionDeclined,
    NoResponse,
}

impl ContactStatus {
    pub const ALL: [ContactStatus; 7] = [
        ContactStatus::Created,
        ContactStatus::InvitationSent,
        ContactStatus::InvitationAccepted,
        ContactStatus::RepliedConnectionRequest,
        ContactStatus::RepliedFollowup,
        ContactStatus::ConnectionDeclined,
        ContactStatus::NoResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Created => "created",
            ContactStatus::InvitationSent => "invitation_sent",
            ContactStatus::InvitationAccepted => "invitation_accepted",
            ContactStatus::RepliedConnectionRequest => "replied_connection_request",
            ContactStatus::RepliedFollowup => "replied_followup",
            ContactStatus::ConnectionDeclined => "connection_declined",
            ContactStatus::NoResponse => "no_response",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContactStatus::ConnectionDeclined | ContactStatus::RepliedFollowup
        )
    }

    pub fn is_replied(&self) -> bool {
        matches!(
            self,
            ContactStatus::RepliedConnectionRequest | ContactStatus::RepliedFollowup
        )
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContactStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown contact status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
        }
    }

    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Draft, Completed)
                | (Active, Completed)
                | (Paused, Completed)
        )
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message tone / template family.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    Networking,
    BusinessOpportunity,
    IndustryInsights,
    Collaboration,
    Mentorship,
}

impl Variant {
    pub const ALL: [Variant; 5] = [
        Variant::Networking,
        Variant::BusinessOpportunity,
        Variant::IndustryInsights,
        Variant::Collaboration,
        Variant::Mentorship,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Networking => "networking",
            Variant::BusinessOpportunity => "business_opportunity",
            Variant::IndustryInsights => "industry_insights",
            Variant::Collaboration => "collaboration",
            Variant::Mentorship => "mentorship",
        }
    }

    /// Short description used when prompting the LLM.
    pub fn context(&self) -> &'static str {
        match self {
            Variant::Networking => "networking and professional relationship building",
            Variant::BusinessOpportunity => "potential business collaboration or partnership",
            Variant::IndustryInsights => "sharing industry insights and knowledge",
            Variant::Collaboration => "collaboration opportunities",
            Variant::Mentorship => "mentorship or guidance",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace([' ', '-'], "_");
        Variant::ALL
            .into_iter()
            .find(|v| v.as_str() == wanted)
            .ok_or_else(|| format!("unknown variant '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TemplateType {
    Connection,
    Followup,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Connection => "connection",
            TemplateType::Followup => "followup",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Default variant for contacts without their own.
    pub variant: Variant,
    pub spreadsheet_url: Option<String>,
    pub connection_template: Option<String>,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub linkedin_url: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,

    pub status: ContactStatus,
    pub variant: Variant,
    /// Handle returned by the automation gateway on submission.
    pub external_id: Option<String>,

    pub followup_attempts: i32,
    pub connection_message: Option<String>,
    pub followup_message: Option<String>,
    pub last_reply: Option<String>,
    /// Latest assessment of `last_reply` (sentiment, interest, next step).
    pub reply_analysis: Option<String>,
    pub reply_analyzed_at: Option<DateTime<Utc>>,

    pub last_contacted_at: Option<DateTime<Utc>>,
    pub last_followup_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub replied_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Bumped on every write; used for compare-and-set.
    pub version: i64,
}

impl Contact {
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MessageTemplate {
    pub id: Uuid,
    pub name: String,
    pub variant: Variant,
    pub template_type: TemplateType,
    pub content: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a campaign.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub variant: Variant,
    pub spreadsheet_url: Option<String>,
    pub connection_template: Option<String>,
}

/// Input for creating a contact (one spreadsheet row or API item).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContact {
    pub linkedin_url: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    /// Falls back to the campaign variant.
    pub variant: Option<Variant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub variant: Variant,
    pub template_type: TemplateType,
    pub content: String,
}

/// Filters for listing contacts; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactFilter {
    pub campaign_id: Option<Uuid>,
    pub status: Option<ContactStatus>,
    pub variant: Option<Variant>,
    /// Case-insensitive substring match.
    pub company: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in ContactStatus::ALL {
            assert_eq!(status.as_str().parse::<ContactStatus>(), Ok(status));
        }
        assert!("archived".parse::<ContactStatus>().is_err());
    }

    #[test]
    fn test_variant_parsing_is_lenient() {
        assert_eq!("Business Opportunity".parse::<Variant>(), Ok(Variant::BusinessOpportunity));
        assert_eq!("industry-insights".parse::<Variant>(), Ok(Variant::IndustryInsights));
        assert!("sales".parse::<Variant>().is_err());
    }

    #[test]
    fn test_campaign_status_edges() {
        assert!(CampaignStatus::Draft.can_transition_to(CampaignStatus::Active));
        assert!(CampaignStatus::Paused.can_transition_to(CampaignStatus::Active));
        assert!(!CampaignStatus::Completed.can_transition_to(CampaignStatus::Active));
        assert!(!CampaignStatus::Active.can_transition_to(CampaignStatus::Draft));
    }

    #[test]
    fn test_full_name() {
        let contact = Contact {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            linkedin_url: "https://www.linkedin.com/in/jdoe".into(),
            first_name: "John".into(),
            last_name: Some("Doe".into()),
            company: None,
            job_title: None,
            status: ContactStatus::Created,
            variant: Variant::Networking,
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
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: 0,
        };
        assert_eq!(contact.full_name(), "John Doe");
    }
}
