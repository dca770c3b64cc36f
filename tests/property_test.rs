//! Property tests for envelope parsing and the fold table.
//!
//! These run without a database: the parser must be total over arbitrary
//! JSON, the campaign-identifier guard must be exact, and the set-fold
//! table must be order independent and idempotent under the same set
//! semantics the recipient table's primary key enforces.

use std::collections::BTreeSet;

use proptest::prelude::*;
use tally_core::{
    envelope::{CampaignRef, Envelope, EventKind},
    models::CampaignId,
};
use tally_pipeline::FoldAction;

fn json_leaf() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        "[a-z0-9_@. ]{0,20}".prop_map(serde_json::Value::from),
    ]
}

fn json_value() -> impl Strategy<Value = serde_json::Value> {
    json_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
            prop::collection::btree_map("[a-z_]{1,12}", inner, 0..4)
                .prop_map(|map| serde_json::Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn envelope_parse_is_total(payload in json_value()) {
        // Must never panic, whatever the provider sends.
        let _ = Envelope::parse(&payload);
    }

    #[test]
    fn payloads_without_msys_are_unrecognized(payload in json_value()) {
        let has_msys = payload.as_object().is_some_and(|obj| obj.contains_key("msys"));
        prop_assume!(!has_msys);

        prop_assert!(matches!(Envelope::parse(&payload), Envelope::Unrecognized));
    }

    #[test]
    fn numeric_references_always_validate(id in any::<i64>()) {
        prop_assert_eq!(CampaignRef::Numeric(id).as_campaign_id(), Some(CampaignId(id)));
        prop_assert_eq!(
            CampaignRef::Text(id.to_string()).as_campaign_id(),
            Some(CampaignId(id))
        );
        prop_assert_eq!(
            CampaignRef::Text(format!("  {id} ")).as_campaign_id(),
            Some(CampaignId(id))
        );
    }

    #[test]
    fn alphabetic_references_never_validate(text in "[a-z]{1,8}") {
        prop_assert_eq!(CampaignRef::Text(text).as_campaign_id(), None);
    }
}

/// One fold request against the in-memory set model.
#[derive(Debug, Clone)]
struct ModelFold {
    kind: EventKind,
    email: String,
}

fn fold_kind() -> impl Strategy<Value = EventKind> {
    prop_oneof![
        Just(EventKind::Delivery),
        Just(EventKind::Click),
        Just(EventKind::Open),
        Just(EventKind::InitialOpen),
        Just(EventKind::Bounce),
        Just(EventKind::SpamComplaint),
        Just(EventKind::ListUnsubscribe),
        Just(EventKind::LinkUnsubscribe),
        Just(EventKind::Other),
    ]
}

fn fold_batch() -> impl Strategy<Value = Vec<ModelFold>> {
    prop::collection::vec(
        (fold_kind(), prop::sample::select(vec!["a@x.com", "b@x.com", "c@x.com"])),
        0..24,
    )
    .prop_map(|folds| {
        folds
            .into_iter()
            .map(|(kind, email)| ModelFold { kind, email: email.to_string() })
            .collect()
    })
}

fn permuted_batches() -> impl Strategy<Value = (Vec<ModelFold>, Vec<ModelFold>)> {
    fold_batch().prop_flat_map(|batch| {
        let original = batch.clone();
        Just(batch).prop_shuffle().prop_map(move |shuffled| (original.clone(), shuffled))
    })
}

/// Applies folds with the same semantics the storage layer enforces:
/// sets keyed by (set, email), bounces as an append-only count.
fn apply(folds: &[ModelFold]) -> (BTreeSet<(String, String)>, usize) {
    let mut sets = BTreeSet::new();
    let mut bounces = 0;
    for fold in folds {
        match FoldAction::for_kind(fold.kind) {
            FoldAction::AddTo(set) => {
                sets.insert((set.to_string(), fold.email.clone()));
            },
            FoldAction::RecordBounce => bounces += 1,
            FoldAction::Ignore => {},
        }
    }
    (sets, bounces)
}

proptest! {
    #[test]
    fn set_folds_are_order_independent((original, shuffled) in permuted_batches()) {
        let (original_sets, original_bounces) = apply(&original);
        let (shuffled_sets, shuffled_bounces) = apply(&shuffled);

        prop_assert_eq!(original_sets, shuffled_sets);
        prop_assert_eq!(original_bounces, shuffled_bounces);
    }

    #[test]
    fn set_folds_are_idempotent(batch in fold_batch()) {
        let (once, _) = apply(&batch);

        let mut twice_input = batch.clone();
        twice_input.extend(batch.iter().cloned());
        let (twice, _) = apply(&twice_input);

        prop_assert_eq!(once, twice, "re-folding must not change set cardinality");
    }
}
