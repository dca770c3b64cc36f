//! Fixture builders for campaigns and provider envelopes.
//!
//! Envelope builders mirror the provider's wire format exactly, including
//! the string-typed campaign identifier, so tests exercise the same parse
//! path production traffic takes.

use chrono::Utc;
use serde_json::{json, Value};
use tally_core::models::{Campaign, CampaignId, CampaignStats};

/// A tracking-event envelope (opens, clicks).
pub fn track_event(campaign_id: &str, rcpt_to: &str, kind: &str) -> Value {
    json!({
        "msys": {
            "track_event": {
                "campaign_id": campaign_id,
                "rcpt_to": rcpt_to,
                "type": kind
            }
        }
    })
}

/// A message-event envelope (deliveries, bounces, spam complaints).
pub fn message_event(campaign_id: &str, rcpt_to: &str, kind: &str) -> Value {
    json!({
        "msys": {
            "message_event": {
                "campaign_id": campaign_id,
                "rcpt_to": rcpt_to,
                "type": kind
            }
        }
    })
}

/// A bounce message-event envelope with a classification code.
pub fn bounce_event(campaign_id: &str, rcpt_to: &str, bounce_class: &str) -> Value {
    json!({
        "msys": {
            "message_event": {
                "campaign_id": campaign_id,
                "rcpt_to": rcpt_to,
                "type": "bounce",
                "bounce_class": bounce_class
            }
        }
    })
}

/// An unsubscribe-event envelope.
pub fn unsubscribe_event(campaign_id: &str, rcpt_to: &str, kind: &str) -> Value {
    json!({
        "msys": {
            "unsubscribe_event": {
                "campaign_id": campaign_id,
                "rcpt_to": rcpt_to,
                "type": kind
            }
        }
    })
}

/// A payload with none of the three known envelope shapes.
pub fn unrecognized_event() -> Value {
    json!({
        "msys": {
            "relay_event": {
                "rcpt_to": "ghost@x.com",
                "type": "relay_delivery"
            }
        }
    })
}

/// A campaign row the way the campaign-creation service writes it.
pub fn sample_campaign(campaign_id: i64) -> Campaign {
    Campaign {
        campaign_id: CampaignId(campaign_id),
        subject: format!("Spring launch #{campaign_id}"),
        from_name: "Tally Newsletter".to_string(),
        from_email: "news@tally.example".to_string(),
        html_content: "<p>Hello!</p>".to_string(),
        scheduled_at: None,
        template_id: None,
        recipient_list_id: None,
        schedule_sent_at: None,
        stats: sqlx::types::Json(CampaignStats::default()),
        created_at: Utc::now(),
    }
}
