//! Classification pass integration tests.
//!
//! Covers the fold table end to end: idempotent set folds, order
//! independence, bounce accumulation, the two skip guards, and per-event
//! failure isolation.

#![cfg(feature = "docker")]

use tally_core::models::{CampaignId, EngagementSet};
use tally_pipeline::Classifier;
use tally_testing::{fixtures, TestEnv};

fn classifier(env: &TestEnv) -> Classifier {
    Classifier::new(env.storage.clone(), env.clock_handle(), 500)
}

#[tokio::test]
async fn click_event_folds_into_clicked_set() {
    let env = TestEnv::new().await.expect("Failed to create test environment");
    env.ingest(fixtures::track_event("42", "a@x.com", "click")).await.expect("ingest");

    let summary = classifier(&env).run_pass().await.expect("pass should run");

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);

    let clicked = env
        .storage
        .campaigns
        .recipients(CampaignId(42), EngagementSet::Clicked)
        .await
        .expect("query");
    assert_eq!(clicked, vec!["a@x.com".to_string()]);

    let unprocessed = env.storage.raw_events.count_unprocessed().await.expect("count");
    assert_eq!(unprocessed, 0);

    let marker = env.storage.active_campaigns.find(CampaignId(42)).await.expect("query");
    assert!(marker.is_some(), "classified events must touch the active marker");
}

#[tokio::test]
async fn refolding_the_same_event_is_idempotent() {
    let env = TestEnv::new().await.expect("Failed to create test environment");

    // The provider redelivers without exactly-once guarantees; the same
    // engagement arrives twice as two raw events.
    for _ in 0..2 {
        env.ingest(fixtures::message_event("42", "dup@x.com", "delivery")).await.expect("ingest");
    }

    let summary = classifier(&env).run_pass().await.expect("pass should run");
    assert_eq!(summary.processed, 2);

    let delivered = env
        .storage
        .campaigns
        .recipients(CampaignId(42), EngagementSet::Delivered)
        .await
        .expect("query");
    assert_eq!(delivered.len(), 1, "set cardinality must not grow on re-fold");
}

#[tokio::test]
async fn fold_result_is_order_independent() {
    let env = TestEnv::new().await.expect("Failed to create test environment");

    let emails = ["a@x.com", "b@x.com", "c@x.com"];
    for email in emails {
        env.ingest(fixtures::track_event("1", email, "open")).await.expect("ingest");
    }
    for email in emails.iter().rev() {
        env.ingest(fixtures::track_event("2", email, "open")).await.expect("ingest");
    }

    classifier(&env).run_pass().await.expect("pass should run");

    let first = env
        .storage
        .campaigns
        .recipients(CampaignId(1), EngagementSet::Opened)
        .await
        .expect("query");
    let second = env
        .storage
        .campaigns
        .recipients(CampaignId(2), EngagementSet::Opened)
        .await
        .expect("query");
    assert_eq!(first, second, "permuted same-kind folds must produce identical sets");
}

#[tokio::test]
async fn open_variants_share_one_set() {
    let env = TestEnv::new().await.expect("Failed to create test environment");
    env.ingest(fixtures::track_event("5", "first@x.com", "initial_open")).await.expect("ingest");
    env.ingest(fixtures::track_event("5", "first@x.com", "open")).await.expect("ingest");

    classifier(&env).run_pass().await.expect("pass should run");

    let opened = env
        .storage
        .campaigns
        .recipients(CampaignId(5), EngagementSet::Opened)
        .await
        .expect("query");
    assert_eq!(opened.len(), 1, "initial_open and open fold into the same set");
}

#[tokio::test]
async fn bounces_accumulate_without_dedup() {
    let env = TestEnv::new().await.expect("Failed to create test environment");
    env.ingest(fixtures::bounce_event("42", "gone@x.com", "10")).await.expect("ingest");
    env.ingest(fixtures::bounce_event("42", "gone@x.com", "22")).await.expect("ingest");

    classifier(&env).run_pass().await.expect("pass should run");

    let bounces = env.storage.campaigns.bounces(CampaignId(42)).await.expect("query");
    assert_eq!(bounces.len(), 2, "distinct bounce codes for one address both appear");

    let codes: Vec<_> = bounces.iter().filter_map(|b| b.bounce_code.as_deref()).collect();
    assert_eq!(codes, vec!["10", "22"], "bounce list preserves arrival order");
}

#[tokio::test]
async fn non_numeric_campaign_id_is_never_folded() {
    let env = TestEnv::new().await.expect("Failed to create test environment");
    env.ingest(fixtures::track_event("abc", "a@x.com", "click")).await.expect("ingest");

    let summary = classifier(&env).run_pass().await.expect("pass should run");

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.skipped, 1);

    let unprocessed = env.storage.raw_events.count_unprocessed().await.expect("count");
    assert_eq!(unprocessed, 1, "guarded events stay unprocessed for inspection");

    let markers = env
        .storage
        .active_campaigns
        .find_touched_since(chrono::DateTime::UNIX_EPOCH)
        .await
        .expect("query");
    assert!(markers.is_empty(), "no campaign may be touched for an invalid identifier");
}

#[tokio::test]
async fn unrecognized_shapes_stay_unprocessed() {
    let env = TestEnv::new().await.expect("Failed to create test environment");
    env.ingest(fixtures::unrecognized_event()).await.expect("ingest");

    let summary = classifier(&env).run_pass().await.expect("pass should run");

    assert_eq!(summary.skipped, 1);
    let unprocessed = env.storage.raw_events.count_unprocessed().await.expect("count");
    assert_eq!(unprocessed, 1);

    // Re-running does not change the outcome; the event waits for a human.
    let summary = classifier(&env).run_pass().await.expect("pass should run");
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn unknown_kinds_are_processed_as_no_ops() {
    let env = TestEnv::new().await.expect("Failed to create test environment");
    env.ingest(fixtures::track_event("42", "z@x.com", "amp_initial_open")).await.expect("ingest");

    let summary = classifier(&env).run_pass().await.expect("pass should run");

    assert_eq!(summary.processed, 1, "well-formed unknown kinds are intentionally dropped");
    let unprocessed = env.storage.raw_events.count_unprocessed().await.expect("count");
    assert_eq!(unprocessed, 0);

    for set in EngagementSet::ALL {
        let members =
            env.storage.campaigns.recipients(CampaignId(42), set).await.expect("query");
        assert!(members.is_empty(), "no-op folds must not touch the {set} set");
    }

    let marker = env.storage.active_campaigns.find(CampaignId(42)).await.expect("query");
    assert!(marker.is_some(), "the campaign still counts as active");
}

#[tokio::test]
async fn storage_failure_on_one_event_does_not_abort_the_pass() {
    let env = TestEnv::new().await.expect("Failed to create test environment");
    env.ingest(fixtures::track_event("42", "a@x.com", "click")).await.expect("ingest");
    env.ingest(fixtures::unrecognized_event()).await.expect("ingest");

    // Break the fold target to simulate aggregate-store unavailability.
    sqlx::query("ALTER TABLE campaign_recipients RENAME TO campaign_recipients_offline")
        .execute(&env.db)
        .await
        .expect("rename");

    let summary = classifier(&env).run_pass().await.expect("pass must survive item failures");
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);

    sqlx::query("ALTER TABLE campaign_recipients_offline RENAME TO campaign_recipients")
        .execute(&env.db)
        .await
        .expect("rename back");

    // The failed event is retried on the next scheduled pass.
    let summary = classifier(&env).run_pass().await.expect("pass should run");
    assert_eq!(summary.processed, 1);

    let clicked = env
        .storage
        .campaigns
        .recipients(CampaignId(42), EngagementSet::Clicked)
        .await
        .expect("query");
    assert_eq!(clicked, vec!["a@x.com".to_string()]);
}
