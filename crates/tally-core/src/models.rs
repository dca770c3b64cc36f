//! Core domain models and strongly-typed identifiers.
//!
//! Defines raw webhook events, campaign aggregates, engagement sets, and
//! newtype ID wrappers for compile-time type safety. Includes the database
//! serialization traits used by the repository layer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Strongly-typed raw event identifier.
///
/// Wraps a UUID to prevent mixing with other ID types. A raw event is
/// immutable once appended, apart from its processed flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for EventId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for EventId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for EventId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Strongly-typed campaign identifier.
///
/// Campaign identifiers arrive from the provider as the textual
/// `campaign_id` field of an envelope and are only accepted once they have
/// been validated as numeric. The sending platform assigns them; this
/// pipeline never mints new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignId(pub i64);

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CampaignId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl sqlx::Type<PgDb> for CampaignId {
    fn type_info() -> PgTypeInfo {
        <i64 as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for CampaignId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let id = <i64 as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(id))
    }
}

impl sqlx::Encode<'_, PgDb> for CampaignId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <i64 as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Raw inbound webhook event.
///
/// One row per item of an ingested batch. The payload is stored verbatim
/// as JSONB; classification happens later, in arrival order. Once
/// `processed` is set the row is immutable until the retention sweeper
/// deletes it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RawEvent {
    /// Unique identifier for this event.
    pub id: EventId,

    /// When the event was accepted by the ingestion endpoint.
    pub received_at: DateTime<Utc>,

    /// Whether the classifier has folded this event.
    ///
    /// Events with unrecognized shapes or invalid campaign identifiers are
    /// deliberately left unprocessed for manual inspection.
    pub processed: bool,

    /// The provider-defined envelope, stored uninterpreted.
    pub payload: sqlx::types::Json<serde_json::Value>,
}

impl RawEvent {
    /// Creates an unprocessed raw event from an inbound payload.
    pub fn new(payload: serde_json::Value, received_at: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            received_at,
            processed: false,
            payload: sqlx::types::Json(payload),
        }
    }

    /// The stored payload value.
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload.0
    }
}

/// The engagement sets a recipient email can be folded into.
///
/// Each variant names one recipient set on a campaign. Membership is
/// unique per email address; folding the same event twice does not grow
/// the set. Bounces are not a set: they accumulate in a separate list
/// because distinct bounce events may carry different classification codes
/// for the same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementSet {
    /// Successfully delivered recipients.
    Delivered,
    /// Recipients who opened the message (first or repeat open).
    Opened,
    /// Recipients who clicked a tracked link.
    Clicked,
    /// Recipients who unsubscribed via list or link.
    Unsubscribed,
    /// Recipients who raised a spam complaint.
    Complained,
}

impl EngagementSet {
    /// All sets, in the order they appear in the stats snapshot.
    pub const ALL: [Self; 5] =
        [Self::Delivered, Self::Opened, Self::Clicked, Self::Unsubscribed, Self::Complained];
}

impl fmt::Display for EngagementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => write!(f, "delivered"),
            Self::Opened => write!(f, "opened"),
            Self::Clicked => write!(f, "clicked"),
            Self::Unsubscribed => write!(f, "unsubscribed"),
            Self::Complained => write!(f, "complained"),
        }
    }
}

impl sqlx::Type<PgDb> for EngagementSet {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for EngagementSet {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        match s {
            "delivered" => Ok(Self::Delivered),
            "opened" => Ok(Self::Opened),
            "clicked" => Ok(Self::Clicked),
            "unsubscribed" => Ok(Self::Unsubscribed),
            "complained" => Ok(Self::Complained),
            _ => Err(format!("invalid engagement set: {s}").into()),
        }
    }
}

impl sqlx::Encode<'_, PgDb> for EngagementSet {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <String as sqlx::Encode<PgDb>>::encode_by_ref(&self.to_string(), buf)
    }
}

/// Cached engagement counts for a campaign.
///
/// A pure function of the engagement sets and bounce list at the time of
/// the last reconciliation pass; may be transiently stale between passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStats {
    /// Size of the delivered set.
    pub delivered: i64,
    /// Size of the opened set.
    pub opens: i64,
    /// Size of the clicked set.
    pub clicks: i64,
    /// Length of the bounce list (duplicates included).
    pub bounces: i64,
    /// Size of the unsubscribed set.
    pub unsubscribes: i64,
    /// Size of the complaint set.
    pub spam_complaints: i64,
}

impl CampaignStats {
    /// Returns the counter for one engagement set.
    pub fn for_set(&self, set: EngagementSet) -> i64 {
        match set {
            EngagementSet::Delivered => self.delivered,
            EngagementSet::Opened => self.opens,
            EngagementSet::Clicked => self.clicks,
            EngagementSet::Unsubscribed => self.unsubscribes,
            EngagementSet::Complained => self.spam_complaints,
        }
    }

    /// Sets the counter for one engagement set.
    pub fn set_for(&mut self, set: EngagementSet, count: i64) {
        match set {
            EngagementSet::Delivered => self.delivered = count,
            EngagementSet::Opened => self.opens = count,
            EngagementSet::Clicked => self.clicks = count,
            EngagementSet::Unsubscribed => self.unsubscribes = count,
            EngagementSet::Complained => self.spam_complaints = count,
        }
    }
}

/// Campaign aggregate.
///
/// The descriptive fields (subject, sender identity, content, schedule)
/// are owned by the campaign-creation service and are read-only here; the
/// pipeline only ever writes the `stats` snapshot. Recipient sets and the
/// bounce list live in their own tables keyed by `campaign_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    /// Provider-assigned campaign identifier.
    pub campaign_id: CampaignId,

    /// Message subject line.
    pub subject: String,

    /// Display name of the sender.
    pub from_name: String,

    /// Sender email address.
    pub from_email: String,

    /// Rendered message body.
    pub html_content: String,

    /// When the campaign is scheduled to send, if scheduled.
    pub scheduled_at: Option<DateTime<Utc>>,

    /// Provider template reference, if the campaign uses one.
    pub template_id: Option<String>,

    /// Recipient list reference.
    pub recipient_list_id: Option<String>,

    /// When the scheduled send was handed off, if it has been.
    pub schedule_sent_at: Option<DateTime<Utc>>,

    /// Cached engagement counts from the last reconciliation pass.
    pub stats: sqlx::types::Json<CampaignStats>,

    /// When the campaign record was created.
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// The cached stats snapshot.
    pub fn stats(&self) -> &CampaignStats {
        &self.stats.0
    }
}

/// One recorded bounce.
///
/// Bounce records are append-only and deliberately not deduplicated: the
/// same address can legitimately bounce more than once with different
/// classification codes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BounceRecord {
    /// Campaign the bounce belongs to.
    pub campaign_id: CampaignId,

    /// Bounced recipient address.
    pub email: String,

    /// Provider bounce classification code, when the envelope carried one.
    pub bounce_code: Option<String>,

    /// When the classifier recorded the bounce.
    pub recorded_at: DateTime<Utc>,
}

/// Ephemeral marker for a campaign that received events recently.
///
/// Existence with a recent timestamp is a hint that scopes the next stats
/// recompute; it may race with concurrent folds. Absence merely means the
/// campaign is not scheduled for imminent recomputation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActiveCampaign {
    /// Campaign the marker refers to.
    pub campaign_id: CampaignId,

    /// Last time the classifier folded an event for this campaign.
    pub last_touched_at: DateTime<Utc>,
}
