//! Notification fan-out integration tests.
//!
//! The poller groups tracking matches into one batch per user and enqueues
//! each batch as a JSON job payload; the worker decodes that payload and
//! delivers it. These tests pin the grouping rules and the payload contract
//! between the two crates.

use chrono::Utc;
use uuid::Uuid;

use shelfwatch_core::{JOB_PRODUCT_BACK_IN_STOCK, NotificationBatch, SubstoreId, TrackingMatch};
use shelfwatch_integration_tests::{RecordingMailer, sample_product, sample_user};
use shelfwatch_poller::fanout::group_by_user;
use shelfwatch_worker::db::{JobStatus, NotificationJob};
use shelfwatch_worker::runner::process_job;

fn tracking_match(user_id: &str, product_id: &str, substore_id: &str) -> TrackingMatch {
    TrackingMatch {
        user: sample_user(
            user_id,
            &format!("User {user_id}"),
            &format!("{user_id}@example.com"),
        ),
        product: sample_product(product_id, &format!("Product {product_id}")),
        substore_id: SubstoreId::new(substore_id),
    }
}

#[test]
fn test_one_batch_per_user_across_substores() {
    let matches = vec![
        tracking_match("usr_a", "p1", "sub_d"),
        tracking_match("usr_a", "p2", "sub_m"),
        tracking_match("usr_b", "p1", "sub_d"),
    ];

    let batches = group_by_user(matches);

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].products.len(), 2, "usr_a tracks in two substores");
    assert_eq!(batches[1].products.len(), 1);
}

#[test]
fn test_products_keep_match_order_within_a_batch() {
    let matches = vec![
        tracking_match("usr_a", "p3", "sub_d"),
        tracking_match("usr_a", "p1", "sub_d"),
        tracking_match("usr_a", "p2", "sub_m"),
    ];

    let batches = group_by_user(matches);

    let ids: Vec<&str> = batches[0]
        .products
        .iter()
        .map(|product| product.id.as_str())
        .collect();
    assert_eq!(ids, vec!["p3", "p1", "p2"]);
}

#[test]
fn test_job_type_constant_is_stable() {
    // Queued rows outlive deploys; the discriminator must not drift.
    assert_eq!(JOB_PRODUCT_BACK_IN_STOCK, "product_back_in_stock");
}

#[tokio::test]
async fn test_enqueued_payload_is_deliverable_by_the_worker() {
    let batch = NotificationBatch {
        user: sample_user("usr_a", "Asha", "asha@example.com"),
        products: vec![sample_product("p1", "High Protein Milk")],
    };
    let payload = serde_json::to_value(&batch).expect("encode payload");

    let job = NotificationJob {
        id: Uuid::new_v4(),
        job_type: JOB_PRODUCT_BACK_IN_STOCK.to_owned(),
        payload,
        status: JobStatus::Running,
        attempts: 1,
        last_error: None,
        created_at: Utc::now(),
        started_at: Some(Utc::now()),
        finished_at: None,
    };

    let mailer = RecordingMailer::default();
    process_job(&mailer, "https://shop.example.com", &job)
        .await
        .expect("process job");

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "asha@example.com");
    assert!(sent[0].html_body.contains("High Protein Milk"));
}
