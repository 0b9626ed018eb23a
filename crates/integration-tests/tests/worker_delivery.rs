//! Worker delivery integration tests.
//!
//! Exercise job processing with a recording mailer: subject selection,
//! rendered bodies, unknown job types, and failure isolation between jobs.

use chrono::Utc;
use uuid::Uuid;

use shelfwatch_core::{JOB_PRODUCT_BACK_IN_STOCK, NotificationBatch, Product, TrackedUser};
use shelfwatch_integration_tests::{RecordingMailer, sample_product, sample_user};
use shelfwatch_worker::db::{JobStatus, NotificationJob};
use shelfwatch_worker::runner::process_job;

const STOREFRONT: &str = "https://shop.example.com";

fn back_in_stock_job(user: TrackedUser, products: Vec<Product>) -> NotificationJob {
    let batch = NotificationBatch { user, products };
    NotificationJob {
        id: Uuid::new_v4(),
        job_type: JOB_PRODUCT_BACK_IN_STOCK.to_owned(),
        payload: serde_json::to_value(&batch).expect("encode payload"),
        status: JobStatus::Running,
        attempts: 1,
        last_error: None,
        created_at: Utc::now(),
        started_at: Some(Utc::now()),
        finished_at: None,
    }
}

#[tokio::test]
async fn test_single_product_subject_names_it() {
    let mailer = RecordingMailer::default();
    let job = back_in_stock_job(
        sample_user("usr_a", "Asha", "asha@example.com"),
        vec![sample_product("p1", "High Protein Milk")],
    );

    process_job(&mailer, STOREFRONT, &job).await.expect("process");

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].subject,
        "Product Back in Stock: High Protein Milk is now available"
    );
}

#[tokio::test]
async fn test_multi_product_subject_counts() {
    let mailer = RecordingMailer::default();
    let job = back_in_stock_job(
        sample_user("usr_a", "Asha", "asha@example.com"),
        vec![
            sample_product("p1", "Milk"),
            sample_product("p2", "Whey"),
            sample_product("p3", "Paneer"),
        ],
    );

    process_job(&mailer, STOREFRONT, &job).await.expect("process");

    let sent = mailer.sent();
    assert_eq!(
        sent[0].subject,
        "Product Back in Stock: 3 products you track are now in stock"
    );
}

#[tokio::test]
async fn test_bodies_carry_greeting_and_product_links() {
    let mailer = RecordingMailer::default();
    let job = back_in_stock_job(
        sample_user("usr_a", "Asha", "asha@example.com"),
        vec![sample_product("p1", "High Protein Milk")],
    );

    process_job(&mailer, STOREFRONT, &job).await.expect("process");

    let sent = mailer.sent();
    assert!(sent[0].html_body.contains("Hi Asha,"));
    assert!(
        sent[0]
            .html_body
            .contains("https://shop.example.com/en/product/p1-alias")
    );
    assert!(sent[0].html_body.contains("SKU: SKU-p1"));
    assert!(
        sent[0]
            .text_body
            .contains("https://shop.example.com/en/product/p1-alias")
    );
}

#[tokio::test]
async fn test_unknown_job_type_sends_nothing_and_succeeds() {
    let mailer = RecordingMailer::default();
    let mut job = back_in_stock_job(
        sample_user("usr_a", "Asha", "asha@example.com"),
        vec![sample_product("p1", "Milk")],
    );
    job.job_type = "price_drop".to_owned();

    process_job(&mailer, STOREFRONT, &job).await.expect("process");

    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_one_failing_recipient_does_not_block_others() {
    let mailer = RecordingMailer::failing_for("asha@example.com");
    let failing = back_in_stock_job(
        sample_user("usr_a", "Asha", "asha@example.com"),
        vec![sample_product("p1", "Milk")],
    );
    let healthy = back_in_stock_job(
        sample_user("usr_b", "Ben", "ben@example.com"),
        vec![sample_product("p1", "Milk")],
    );

    let first = process_job(&mailer, STOREFRONT, &failing).await;
    assert!(first.is_err(), "rejected recipient fails its own job");

    process_job(&mailer, STOREFRONT, &healthy)
        .await
        .expect("other jobs are unaffected");

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ben@example.com");
}
