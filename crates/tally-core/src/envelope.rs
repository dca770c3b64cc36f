//! Provider envelope model.
//!
//! The email provider wraps every delivery event in one of three known
//! top-level shapes nested under an `msys` member: a tracking event, a
//! message event, or an unsubscribe event. Instead of sniffing the shape at
//! every use site, the payload is decided once at parse time into a tagged
//! union with an explicit [`Envelope::Unrecognized`] variant; everything
//! downstream matches on the variant.
//!
//! Parsing is total: no payload, however malformed, produces an error.

use serde::Deserialize;

use crate::models::CampaignId;

/// A parsed provider envelope.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Engagement tracking event (opens, clicks, initial opens).
    Track(EngagementEvent),
    /// Message disposition event (deliveries, bounces, spam complaints).
    Message(EngagementEvent),
    /// Unsubscribe event (list or link initiated).
    Unsubscribe(EngagementEvent),
    /// None of the three known shapes was present.
    ///
    /// Unrecognized events are never marked processed; they are kept for
    /// manual inspection because the shape is unknown, not invalid.
    Unrecognized,
}

impl Envelope {
    /// Decides the envelope shape for a raw payload.
    ///
    /// The decision is made exactly once; callers match on the result
    /// rather than re-inspecting the JSON. When more than one shape member
    /// is present (the provider never does this) the tracking event wins.
    pub fn parse(payload: &serde_json::Value) -> Self {
        let Ok(parsed) = serde_json::from_value::<ProviderPayload>(payload.clone()) else {
            return Self::Unrecognized;
        };

        let msys = parsed.msys;
        if let Some(event) = msys.track_event {
            Self::Track(event)
        } else if let Some(event) = msys.message_event {
            Self::Message(event)
        } else if let Some(event) = msys.unsubscribe_event {
            Self::Unsubscribe(event)
        } else {
            Self::Unrecognized
        }
    }

    /// The inner event record, for any recognized shape.
    pub fn record(&self) -> Option<&EngagementEvent> {
        match self {
            Self::Track(event) | Self::Message(event) | Self::Unsubscribe(event) => Some(event),
            Self::Unrecognized => None,
        }
    }
}

/// Canonical event record shared by all three envelope shapes.
///
/// Only the fields this pipeline reads are modeled; the provider attaches
/// many more, which serde ignores.
#[derive(Debug, Clone, Deserialize)]
pub struct EngagementEvent {
    /// Campaign identifier as sent by the provider.
    ///
    /// Arrives as either a JSON string or number. Identifiers that are not
    /// numeric belong to a different namespace and are not folded here.
    #[serde(default)]
    pub campaign_id: Option<CampaignRef>,

    /// Recipient email address.
    #[serde(default)]
    pub rcpt_to: Option<String>,

    /// Event kind discriminator (the provider's `type` field).
    #[serde(rename = "type", default)]
    pub kind: EventKind,

    /// Bounce classification code, present on bounce events.
    #[serde(default)]
    pub bounce_class: Option<BounceClass>,
}

impl EngagementEvent {
    /// The validated numeric campaign identifier, if there is one.
    pub fn campaign_id(&self) -> Option<CampaignId> {
        self.campaign_id.as_ref().and_then(CampaignRef::as_campaign_id)
    }

    /// The bounce classification code in textual form.
    pub fn bounce_code(&self) -> Option<String> {
        self.bounce_class.as_ref().map(BounceClass::code)
    }
}

/// Campaign identifier as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CampaignRef {
    /// Identifier sent as a JSON number.
    Numeric(i64),
    /// Identifier sent as a JSON string.
    Text(String),
}

impl CampaignRef {
    /// Validates the reference as a numeric campaign identifier.
    ///
    /// A textual reference must parse as an integer in full (surrounding
    /// whitespace tolerated); anything else is rejected rather than
    /// prefix-parsed, so `"42abc"` does not silently become campaign 42.
    pub fn as_campaign_id(&self) -> Option<CampaignId> {
        match self {
            Self::Numeric(id) => Some(CampaignId(*id)),
            Self::Text(text) => text.trim().parse::<i64>().ok().map(CampaignId),
        }
    }
}

/// Bounce classification code as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BounceClass {
    /// Code sent as a JSON number.
    Numeric(i64),
    /// Code sent as a JSON string.
    Text(String),
}

impl BounceClass {
    /// The code in the textual form it is stored under.
    pub fn code(&self) -> String {
        match self {
            Self::Numeric(code) => code.to_string(),
            Self::Text(code) => code.clone(),
        }
    }
}

/// Provider event kinds this pipeline classifies.
///
/// Kinds the provider may add in the future land on [`EventKind::Other`]
/// and fold as a no-op; the event is still marked processed because the
/// envelope itself was well-formed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Message accepted by the recipient server.
    Delivery,
    /// Recipient clicked a tracked link.
    Click,
    /// Recipient opened the message.
    Open,
    /// First open for this recipient.
    InitialOpen,
    /// Message bounced.
    Bounce,
    /// Recipient flagged the message as spam.
    SpamComplaint,
    /// Unsubscribe via the list header.
    ListUnsubscribe,
    /// Unsubscribe via a tracked link.
    LinkUnsubscribe,
    /// Any kind this pipeline does not classify.
    #[serde(other)]
    #[default]
    Other,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivery => write!(f, "delivery"),
            Self::Click => write!(f, "click"),
            Self::Open => write!(f, "open"),
            Self::InitialOpen => write!(f, "initial_open"),
            Self::Bounce => write!(f, "bounce"),
            Self::SpamComplaint => write!(f, "spam_complaint"),
            Self::ListUnsubscribe => write!(f, "list_unsubscribe"),
            Self::LinkUnsubscribe => write!(f, "link_unsubscribe"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderPayload {
    msys: MsysBody,
}

#[derive(Debug, Default, Deserialize)]
struct MsysBody {
    #[serde(default)]
    track_event: Option<EngagementEvent>,
    #[serde(default)]
    message_event: Option<EngagementEvent>,
    #[serde(default)]
    unsubscribe_event: Option<EngagementEvent>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn track_event_parses_with_all_fields() {
        let payload = json!({
            "msys": {
                "track_event": {
                    "campaign_id": "42",
                    "rcpt_to": "a@x.com",
                    "type": "click"
                }
            }
        });

        let envelope = Envelope::parse(&payload);
        let Envelope::Track(event) = envelope else {
            panic!("expected track envelope, got {envelope:?}");
        };
        assert_eq!(event.campaign_id(), Some(CampaignId(42)));
        assert_eq!(event.rcpt_to.as_deref(), Some("a@x.com"));
        assert_eq!(event.kind, EventKind::Click);
    }

    #[test]
    fn message_event_carries_bounce_class() {
        let payload = json!({
            "msys": {
                "message_event": {
                    "campaign_id": 7,
                    "rcpt_to": "b@x.com",
                    "type": "bounce",
                    "bounce_class": 10
                }
            }
        });

        let Envelope::Message(event) = Envelope::parse(&payload) else {
            panic!("expected message envelope");
        };
        assert_eq!(event.campaign_id(), Some(CampaignId(7)));
        assert_eq!(event.kind, EventKind::Bounce);
        assert_eq!(event.bounce_code().as_deref(), Some("10"));
    }

    #[test]
    fn unsubscribe_event_parses() {
        let payload = json!({
            "msys": {
                "unsubscribe_event": {
                    "campaign_id": "9",
                    "rcpt_to": "c@x.com",
                    "type": "list_unsubscribe"
                }
            }
        });

        let Envelope::Unsubscribe(event) = Envelope::parse(&payload) else {
            panic!("expected unsubscribe envelope");
        };
        assert_eq!(event.kind, EventKind::ListUnsubscribe);
    }

    #[test]
    fn missing_msys_is_unrecognized() {
        assert!(matches!(Envelope::parse(&json!({"other": 1})), Envelope::Unrecognized));
        assert!(matches!(Envelope::parse(&json!("just a string")), Envelope::Unrecognized));
        assert!(matches!(Envelope::parse(&json!(null)), Envelope::Unrecognized));
    }

    #[test]
    fn msys_without_known_members_is_unrecognized() {
        let payload = json!({"msys": {"relay_event": {"type": "relay"}}});
        assert!(matches!(Envelope::parse(&payload), Envelope::Unrecognized));
    }

    #[test]
    fn unknown_kind_maps_to_other() {
        let payload = json!({
            "msys": {"track_event": {"campaign_id": "1", "rcpt_to": "d@x.com", "type": "amp_click"}}
        });

        let event = Envelope::parse(&payload).record().cloned().expect("recognized");
        assert_eq!(event.kind, EventKind::Other);
    }

    #[test]
    fn missing_type_defaults_to_other() {
        let payload = json!({"msys": {"track_event": {"campaign_id": "1", "rcpt_to": "e@x.com"}}});

        let event = Envelope::parse(&payload).record().cloned().expect("recognized");
        assert_eq!(event.kind, EventKind::Other);
    }

    #[test]
    fn non_numeric_campaign_id_is_rejected() {
        for raw in ["abc", "42abc", "12.5", ""] {
            let reference = CampaignRef::Text(raw.to_string());
            assert_eq!(reference.as_campaign_id(), None, "{raw:?} should be rejected");
        }
    }

    #[test]
    fn numeric_campaign_ids_are_accepted() {
        assert_eq!(CampaignRef::Numeric(42).as_campaign_id(), Some(CampaignId(42)));
        assert_eq!(CampaignRef::Text("42".into()).as_campaign_id(), Some(CampaignId(42)));
        assert_eq!(CampaignRef::Text(" 42 ".into()).as_campaign_id(), Some(CampaignId(42)));
        assert_eq!(CampaignRef::Text("-3".into()).as_campaign_id(), Some(CampaignId(-3)));
    }

    #[test]
    fn track_event_wins_when_multiple_members_present() {
        let payload = json!({
            "msys": {
                "track_event": {"campaign_id": "1", "type": "open"},
                "message_event": {"campaign_id": "1", "type": "bounce"}
            }
        });

        assert!(matches!(Envelope::parse(&payload), Envelope::Track(_)));
    }
}
