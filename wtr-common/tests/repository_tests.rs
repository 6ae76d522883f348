//! Repository behavior against a file-backed database
//!
//! Each test gets its own temp directory so tests run in parallel.

use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;

use wtr_common::db::email_jobs::{self, PlannedStep};
use wtr_common::db::leads::{self, LeadFilter, LeadUpdate};
use wtr_common::db::orders::{self, CheckoutCustomer, CheckoutItem, CheckoutRequest};
use wtr_common::db::{analytics, init_database, products, stats};
use wtr_common::models::analytics::names;
use wtr_common::models::{
    ConversionStage, ConvictionType, EmailJobStatus, LeadInput, LeadReason, LeadSegment,
    NewAnalyticsEvent, OrderStatus, PaymentStatus, ProbationStatus, ProductInput, ProductKind,
    ProductStatus, Urgency,
};
use wtr_common::Error;

const YEAR: i32 = 2026;

async fn setup() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("wtr.db")).await.unwrap();
    (dir, pool)
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
}

fn intake(email: &str) -> LeadInput {
    LeadInput {
        first_name: Some("Rosa".into()),
        email: email.into(),
        ..Default::default()
    }
}

fn product_input(name: &str, price_cents: i64, stock: Option<i64>) -> ProductInput {
    ProductInput {
        name: name.into(),
        slug: None,
        description: None,
        kind: ProductKind::Diy,
        price_cents,
        compare_at_cents: None,
        status: ProductStatus::Active,
        stock,
    }
}

fn checkout_request(product_id: &str, quantity: i64, promo: Option<&str>) -> CheckoutRequest {
    CheckoutRequest {
        lead_id: None,
        customer: CheckoutCustomer {
            name: "Rosa Diaz".into(),
            email: "rosa@example.com".into(),
            phone: None,
        },
        items: vec![CheckoutItem {
            product_id: product_id.into(),
            quantity,
        }],
        promo_code: promo.map(str::to_string),
    }
}

#[tokio::test]
async fn test_capture_scores_new_lead() {
    let (_dir, pool) = setup().await;

    let input = LeadInput {
        first_name: Some("Rosa".into()),
        email: "rosa@example.com".into(),
        phone: Some("555-0100".into()),
        conviction_type: Some(ConvictionType::Misdemeanor),
        conviction_year: Some(2015),
        probation_status: Some(ProbationStatus::Completed),
        urgency: Some(Urgency::Immediate),
        reason: Some(LeadReason::Employment),
        ..Default::default()
    };

    let captured = leads::capture(&pool, input, now(), YEAR).await.unwrap();
    assert!(captured.is_new);
    assert_eq!(captured.lead.lead_score, 105);
    assert_eq!(captured.lead.lead_segment, LeadSegment::Hot);
    assert_eq!(captured.lead.conversion_stage, ConversionStage::Lead);

    let stored = leads::get(&pool, &captured.lead.id).await.unwrap();
    assert_eq!(stored.lead_score, 105);
}

#[tokio::test]
async fn test_capture_dedupes_by_email_and_rescores() {
    let (_dir, pool) = setup().await;

    let first = leads::capture(&pool, intake("rosa@example.com"), now(), YEAR)
        .await
        .unwrap();
    assert_eq!(first.lead.lead_score, 5);
    assert_eq!(first.lead.lead_segment, LeadSegment::Cold);

    let second = LeadInput {
        email: "  ROSA@Example.com ".into(),
        phone: Some("555-0100".into()),
        urgency: Some(Urgency::Immediate),
        ..Default::default()
    };
    let second = leads::capture(&pool, second, now(), YEAR).await.unwrap();

    assert!(!second.is_new);
    assert_eq!(second.lead.id, first.lead.id);
    // Name from the first submission survives
    assert_eq!(second.lead.first_name, "Rosa");
    assert_eq!(second.lead.lead_score, 35);
    assert_eq!(second.lead.lead_segment, LeadSegment::Warm);
    assert_eq!(leads::count(&pool, &LeadFilter::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_capture_rejects_bad_email() {
    let (_dir, pool) = setup().await;
    let result = leads::capture(&pool, intake("nope"), now(), YEAR).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_lead_filters() {
    let (_dir, pool) = setup().await;
    leads::capture(&pool, intake("a@example.com"), now(), YEAR).await.unwrap();
    leads::capture(&pool, intake("b@example.com"), now(), YEAR).await.unwrap();
    let hot = LeadInput {
        email: "hot@example.com".into(),
        phone: Some("1".into()),
        conviction_type: Some(ConvictionType::Misdemeanor),
        urgency: Some(Urgency::Immediate),
        probation_status: Some(ProbationStatus::Completed),
        ..Default::default()
    };
    leads::capture(&pool, hot, now(), YEAR).await.unwrap();

    let hot_filter = LeadFilter {
        segment: Some(LeadSegment::Hot),
        ..Default::default()
    };
    assert_eq!(leads::count(&pool, &hot_filter).await.unwrap(), 1);

    let search = LeadFilter {
        search: Some("b@ex".into()),
        ..Default::default()
    };
    let found = leads::list(&pool, &search, 100, 0).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].email, "b@example.com");

    let page = leads::list(&pool, &LeadFilter::default(), 2, 2).await.unwrap();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn test_admin_update_and_unsubscribe() {
    let (_dir, pool) = setup().await;
    let lead = leads::capture(&pool, intake("rosa@example.com"), now(), YEAR)
        .await
        .unwrap()
        .lead;

    let change = leads::update(
        &pool,
        &lead.id,
        &LeadUpdate {
            conversion_stage: Some(ConversionStage::Upgraded),
            notes: Some("Called back".into()),
            unsubscribed: None,
        },
        now(),
    )
    .await
    .unwrap();
    assert_eq!(change.before.conversion_stage, ConversionStage::Lead);
    assert_eq!(change.after.conversion_stage, ConversionStage::Upgraded);
    assert_eq!(change.after.notes.as_deref(), Some("Called back"));

    assert!(leads::unsubscribe(&pool, &lead.id, now()).await.unwrap());
    assert!(!leads::unsubscribe(&pool, &lead.id, now()).await.unwrap());
    assert!(matches!(
        leads::unsubscribe(&pool, "missing", now()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_activity_increments_are_not_lost() {
    let (_dir, pool) = setup().await;
    let lead = leads::capture(&pool, intake("rosa@example.com"), now(), YEAR)
        .await
        .unwrap()
        .lead;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let pool = pool.clone();
        let id = lead.id.clone();
        handles.push(tokio::spawn(async move {
            leads::record_activity(&pool, &id, names::EMAIL_OPENED, now())
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    let lead = leads::get(&pool, &lead.id).await.unwrap();
    assert_eq!(lead.emails_opened, 20);
    assert_eq!(lead.emails_clicked, 0);
}

#[tokio::test]
async fn test_behavior_flags_from_activity() {
    let (_dir, pool) = setup().await;
    let lead = leads::capture(&pool, intake("rosa@example.com"), now(), YEAR)
        .await
        .unwrap()
        .lead;

    leads::record_activity(&pool, &lead.id, names::PRICING_VIEWED, now()).await.unwrap();
    leads::record_activity(&pool, &lead.id, names::CHECKOUT_ABANDONED, now()).await.unwrap();
    assert!(!leads::record_activity(&pool, "missing", names::EMAIL_CLICKED, now()).await.unwrap());

    let lead = leads::get(&pool, &lead.id).await.unwrap();
    assert!(lead.visited_pricing);
    assert!(lead.abandoned_checkout);
}

#[tokio::test]
async fn test_payment_never_regresses_stage() {
    let (_dir, pool) = setup().await;
    let lead = leads::capture(&pool, intake("rosa@example.com"), now(), YEAR)
        .await
        .unwrap()
        .lead;

    let (old, new) = leads::record_payment(
        &pool,
        &lead.id,
        29_900,
        Some(ConversionStage::Upgraded),
        now(),
    )
    .await
    .unwrap();
    assert_eq!((old, new), (ConversionStage::Lead, ConversionStage::Upgraded));

    let (_, new) = leads::record_payment(
        &pool,
        &lead.id,
        9_900,
        Some(ConversionStage::DiyPurchased),
        now(),
    )
    .await
    .unwrap();
    assert_eq!(new, ConversionStage::Upgraded);

    let lead = leads::get(&pool, &lead.id).await.unwrap();
    assert!(lead.has_paid);
    assert_eq!(lead.amount_paid_cents, 39_800);
}

#[tokio::test]
async fn test_duplicate_product_slug_conflicts() {
    let (_dir, pool) = setup().await;
    let product = products::create(&pool, &product_input("DIY Expungement Kit", 9_900, None), now())
        .await
        .unwrap();
    assert_eq!(product.slug, "diy-expungement-kit");

    let duplicate = products::create(
        &pool,
        &product_input("DIY expungement kit!", 4_900, None),
        now(),
    )
    .await;
    assert!(matches!(duplicate, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_product_update_and_listing() {
    let (_dir, pool) = setup().await;
    let kit = products::create(&pool, &product_input("DIY Kit", 9_900, None), now())
        .await
        .unwrap();
    let mut draft = product_input("Full Service", 49_900, None);
    draft.status = ProductStatus::Draft;
    products::create(&pool, &draft, now()).await.unwrap();

    assert_eq!(products::list(&pool, true).await.unwrap().len(), 1);
    assert_eq!(products::list(&pool, false).await.unwrap().len(), 2);

    let updated = products::update(
        &pool,
        &kit.id,
        &wtr_common::models::ProductUpdate {
            price_cents: Some(7_900),
            ..Default::default()
        },
        now(),
    )
    .await
    .unwrap();
    assert_eq!(updated.price_cents, 7_900);
    assert_eq!(updated.name, "DIY Kit");

    let by_slug = products::get_by_slug(&pool, "diy-kit").await.unwrap();
    assert_eq!(by_slug.id, kit.id);
}

#[tokio::test]
async fn test_checkout_totals_with_promo_and_tax() {
    let (_dir, pool) = setup().await;
    let kit = products::create(&pool, &product_input("DIY Kit", 9_900, None), now())
        .await
        .unwrap();

    let order = orders::checkout(&pool, &checkout_request(&kit.id, 1, Some("cleanslate25")), 725, now())
        .await
        .unwrap();

    assert_eq!(order.subtotal_cents, 9_900);
    assert_eq!(order.discount_cents, 2_475);
    assert_eq!(order.tax_cents, 538);
    assert_eq!(order.total_cents, 7_963);
    assert_eq!(
        order.total_cents,
        order.items.iter().map(|i| i.total_cents).sum::<i64>() + order.tax_cents
            - order.discount_cents
    );
    assert_eq!(order.promo_code.as_deref(), Some("CLEANSLATE25"));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    assert_eq!(order.timeline.len(), 1);
    assert!(order.order_number.starts_with("WTR-20260501-"));
}

#[tokio::test]
async fn test_checkout_links_lead_by_email() {
    let (_dir, pool) = setup().await;
    let lead = leads::capture(&pool, intake("rosa@example.com"), now(), YEAR)
        .await
        .unwrap()
        .lead;
    let kit = products::create(&pool, &product_input("DIY Kit", 9_900, None), now())
        .await
        .unwrap();

    let order = orders::checkout(&pool, &checkout_request(&kit.id, 2, None), 0, now())
        .await
        .unwrap();
    assert_eq!(order.lead_id.as_deref(), Some(lead.id.as_str()));
    assert_eq!(order.total_cents, 19_800);
}

#[tokio::test]
async fn test_checkout_rejections() {
    let (_dir, pool) = setup().await;
    let mut draft = product_input("Draft", 100, None);
    draft.status = ProductStatus::Draft;
    let draft = products::create(&pool, &draft, now()).await.unwrap();
    let kit = products::create(&pool, &product_input("DIY Kit", 9_900, None), now())
        .await
        .unwrap();

    let unavailable = orders::checkout(&pool, &checkout_request(&draft.id, 1, None), 0, now()).await;
    assert!(matches!(unavailable, Err(Error::InvalidInput(_))));

    let bad_promo = orders::checkout(&pool, &checkout_request(&kit.id, 1, Some("FREE100")), 0, now()).await;
    assert!(matches!(bad_promo, Err(Error::InvalidInput(_))));

    let zero_qty = orders::checkout(&pool, &checkout_request(&kit.id, 0, None), 0, now()).await;
    assert!(matches!(zero_qty, Err(Error::InvalidInput(_))));

    let missing = orders::checkout(&pool, &checkout_request("nope", 1, None), 0, now()).await;
    assert!(matches!(missing, Err(Error::NotFound(_))));

    assert_eq!(orders::count(&pool, None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_stock_is_reserved_and_never_oversold() {
    let (_dir, pool) = setup().await;
    let limited = products::create(&pool, &product_input("Consult", 5_000, Some(1)), now())
        .await
        .unwrap();

    orders::checkout(&pool, &checkout_request(&limited.id, 1, None), 0, now())
        .await
        .unwrap();
    let second = orders::checkout(&pool, &checkout_request(&limited.id, 1, None), 0, now()).await;
    assert!(matches!(second, Err(Error::Conflict(_))));

    let product = products::get(&pool, &limited.id).await.unwrap();
    assert_eq!(product.stock, Some(0));
    assert_eq!(orders::count(&pool, None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_checkout_rejects_totals_that_overflow() {
    let (_dir, pool) = setup().await;
    let pricey = products::create(&pool, &product_input("Pricey", i64::MAX / 1_000, Some(5_000)), now())
        .await
        .unwrap();

    let over_cap = orders::checkout(&pool, &checkout_request(&pricey.id, 1_001, None), 0, now()).await;
    assert!(matches!(over_cap, Err(Error::InvalidInput(_))));

    // Line fits at the cap, tax pushes the total past i64
    let result = orders::checkout(&pool, &checkout_request(&pricey.id, 1_000, None), 725, now()).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    let product = products::get(&pool, &pricey.id).await.unwrap();
    assert_eq!(product.stock, Some(5_000));
    assert_eq!(orders::count(&pool, None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_payment_is_idempotent_and_credits_products() {
    let (_dir, pool) = setup().await;
    let kit = products::create(&pool, &product_input("DIY Kit", 9_900, None), now())
        .await
        .unwrap();
    let order = orders::checkout(&pool, &checkout_request(&kit.id, 1, None), 0, now())
        .await
        .unwrap();

    let outcome = orders::record_payment(&pool, &order.id, PaymentStatus::Paid, now())
        .await
        .unwrap();
    assert!(outcome.newly_paid());
    assert_eq!(outcome.previous, PaymentStatus::Unpaid);
    assert_eq!(outcome.order.status, OrderStatus::Processing);
    assert_eq!(outcome.order.timeline.len(), 2);

    let again = orders::record_payment(&pool, &order.id, PaymentStatus::Paid, now())
        .await
        .unwrap();
    assert!(!again.changed);

    let product = products::get(&pool, &kit.id).await.unwrap();
    assert_eq!(product.sales, 1);
    assert_eq!(product.revenue_cents, 9_900);

    let refunded = orders::record_payment(&pool, &order.id, PaymentStatus::Refunded, now())
        .await
        .unwrap();
    assert_eq!(refunded.order.status, OrderStatus::Refunded);
    let product = products::get(&pool, &kit.id).await.unwrap();
    assert_eq!(product.sales, 0);
    assert_eq!(product.revenue_cents, 0);
}

#[tokio::test]
async fn test_payment_marks_linked_lead_in_same_write() {
    let (_dir, pool) = setup().await;
    let lead = leads::capture(&pool, intake("rosa@example.com"), now(), YEAR)
        .await
        .unwrap()
        .lead;
    let kit = products::create(&pool, &product_input("DIY Kit", 9_900, None), now())
        .await
        .unwrap();
    let order = orders::checkout(&pool, &checkout_request(&kit.id, 1, Some("WELCOME10")), 0, now())
        .await
        .unwrap();
    assert_eq!(order.lead_id.as_deref(), Some(lead.id.as_str()));
    assert_eq!(order.total_cents, 8_910);

    let outcome = orders::record_payment(&pool, &order.id, PaymentStatus::Paid, now())
        .await
        .unwrap();
    assert_eq!(
        outcome.lead_stage,
        Some((ConversionStage::Lead, ConversionStage::DiyPurchased))
    );

    let lead = leads::get(&pool, &lead.id).await.unwrap();
    assert!(lead.has_paid);
    assert_eq!(lead.amount_paid_cents, 8_910);

    // Product revenue is gross: list price before the promo discount
    let product = products::get(&pool, &kit.id).await.unwrap();
    assert_eq!(product.revenue_cents, 9_900);

    let again = orders::record_payment(&pool, &order.id, PaymentStatus::Paid, now())
        .await
        .unwrap();
    assert!(again.lead_stage.is_none());
    assert_eq!(leads::get(&pool, &lead.id).await.unwrap().amount_paid_cents, 8_910);
}

#[tokio::test]
async fn test_status_changes_and_notes_append() {
    let (_dir, pool) = setup().await;
    let kit = products::create(&pool, &product_input("DIY Kit", 9_900, None), now())
        .await
        .unwrap();
    let order = orders::checkout(&pool, &checkout_request(&kit.id, 1, None), 0, now())
        .await
        .unwrap();

    let (previous, order) = orders::update_status(
        &pool,
        &order.id,
        OrderStatus::Completed,
        Some("Filed with court".into()),
        now(),
    )
    .await
    .unwrap();
    assert_eq!(previous, OrderStatus::Pending);
    assert_eq!(order.status, OrderStatus::Completed);

    // Unconstrained: completed back to pending is allowed
    let (_, order) = orders::update_status(&pool, &order.id, OrderStatus::Pending, None, now())
        .await
        .unwrap();
    assert_eq!(order.timeline.len(), 3);
    assert_eq!(order.timeline[1].note.as_deref(), Some("Filed with court"));

    let order = orders::add_note(&pool, &order.id, "Customer called", Some("ops".into()), now())
        .await
        .unwrap();
    assert_eq!(order.notes.len(), 1);
    assert!(orders::add_note(&pool, &order.id, "   ", None, now()).await.is_err());

    assert_eq!(orders::count(&pool, Some(OrderStatus::Pending)).await.unwrap(), 1);
    assert_eq!(orders::list(&pool, Some(OrderStatus::Completed), 10, 0).await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_recompute_analytics_from_log() {
    let (_dir, pool) = setup().await;
    let kit = products::create(&pool, &product_input("DIY Kit", 9_900, None), now())
        .await
        .unwrap();

    for name in [names::PRODUCT_VIEW, names::PRODUCT_VIEW, names::ADD_TO_CART] {
        let event = NewAnalyticsEvent {
            event_name: name.into(),
            product_id: Some(kit.id.clone()),
            ..Default::default()
        };
        analytics::insert(&pool, &event, now()).await.unwrap();
    }
    let order = orders::checkout(&pool, &checkout_request(&kit.id, 3, None), 0, now())
        .await
        .unwrap();
    orders::record_payment(&pool, &order.id, PaymentStatus::Paid, now())
        .await
        .unwrap();

    // Counters drift; recompute restores them
    sqlx::query("UPDATE products SET views = 999, sales = 0, revenue_cents = 0")
        .execute(&pool)
        .await
        .unwrap();
    assert_eq!(products::recompute_analytics(&pool, now()).await.unwrap(), 1);

    let product = products::get(&pool, &kit.id).await.unwrap();
    assert_eq!(product.views, 2);
    assert_eq!(product.add_to_cart, 1);
    assert_eq!(product.sales, 3);
    assert_eq!(product.revenue_cents, 29_700);
}

#[tokio::test]
async fn test_analytics_summary_window() {
    let (_dir, pool) = setup().await;
    let old = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    let event = |name: &str| NewAnalyticsEvent {
        event_name: name.into(),
        ..Default::default()
    };
    analytics::insert(&pool, &event(names::PRODUCT_VIEW), old).await.unwrap();
    analytics::insert(&pool, &event(names::PRODUCT_VIEW), now()).await.unwrap();
    analytics::insert(&pool, &event(names::PRODUCT_VIEW), now()).await.unwrap();
    analytics::insert(&pool, &event(names::PRICING_VIEWED), now()).await.unwrap();

    let since = now() - chrono::Duration::days(7);
    let summary = analytics::summary(&pool, since).await.unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.by_name[0].event_name, names::PRODUCT_VIEW);
    assert_eq!(summary.by_name[0].count, 2);
    assert_eq!(summary.by_day.len(), 1);
    assert_eq!(summary.by_day[0].day, "2026-05-01");

    assert!(analytics::insert(&pool, &event("Bad Name"), now()).await.is_err());
}

#[tokio::test]
async fn test_enqueue_is_idempotent_and_claims_are_exclusive() {
    let (_dir, pool) = setup().await;
    let lead = leads::capture(&pool, intake("rosa@example.com"), now(), YEAR)
        .await
        .unwrap()
        .lead;

    let base = 1_000_000;
    let steps = [
        PlannedStep { step_index: 0, due_at_ms: base },
        PlannedStep { step_index: 1, due_at_ms: base + 86_400_000 },
        PlannedStep { step_index: 2, due_at_ms: base + 3 * 86_400_000 },
    ];
    assert_eq!(email_jobs::enqueue(&pool, &lead.id, "welcome", &steps, now()).await.unwrap(), 3);
    assert_eq!(email_jobs::enqueue(&pool, &lead.id, "welcome", &steps, now()).await.unwrap(), 0);
    assert!(email_jobs::is_enrolled(&pool, &lead.id, "welcome").await.unwrap());

    let claimed = email_jobs::claim_due(&pool, base, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].step_index, 0);
    assert_eq!(claimed[0].status, EmailJobStatus::Sending);
    assert_eq!(claimed[0].attempts, 1);

    // Already claimed: a second worker gets nothing
    assert!(email_jobs::claim_due(&pool, base, 10).await.unwrap().is_empty());

    email_jobs::mark_sent(&pool, claimed[0].id, now()).await.unwrap();
    let job = email_jobs::get(&pool, claimed[0].id).await.unwrap();
    assert_eq!(job.status, EmailJobStatus::Sent);
    assert!(job.sent_at.is_some());
}

#[tokio::test]
async fn test_failed_jobs_retry_then_fail() {
    let (_dir, pool) = setup().await;
    let lead = leads::capture(&pool, intake("rosa@example.com"), now(), YEAR)
        .await
        .unwrap()
        .lead;
    let steps = [PlannedStep { step_index: 0, due_at_ms: 0 }];
    email_jobs::enqueue(&pool, &lead.id, "hot_lead", &steps, now()).await.unwrap();

    let job = email_jobs::claim_due(&pool, 10, 10).await.unwrap().remove(0);
    email_jobs::mark_failed(&pool, job.id, "relay down", Some(500)).await.unwrap();

    assert!(email_jobs::claim_due(&pool, 10, 10).await.unwrap().is_empty());
    let job = email_jobs::claim_due(&pool, 500, 10).await.unwrap().remove(0);
    assert_eq!(job.attempts, 2);
    assert_eq!(job.last_error.as_deref(), Some("relay down"));

    email_jobs::mark_failed(&pool, job.id, "relay down", None).await.unwrap();
    let job = email_jobs::get(&pool, job.id).await.unwrap();
    assert_eq!(job.status, EmailJobStatus::Failed);

    let retried = email_jobs::retry(&pool, job.id, 1_000).await.unwrap();
    assert_eq!(retried.status, EmailJobStatus::Pending);
    assert_eq!(retried.attempts, 0);
    assert!(matches!(
        email_jobs::retry(&pool, job.id, 1_000).await,
        Err(Error::Conflict(_))
    ));
}

#[tokio::test]
async fn test_stale_sending_jobs_recover() {
    let (_dir, pool) = setup().await;
    let lead = leads::capture(&pool, intake("rosa@example.com"), now(), YEAR)
        .await
        .unwrap()
        .lead;
    let steps = [
        PlannedStep { step_index: 0, due_at_ms: 0 },
        PlannedStep { step_index: 1, due_at_ms: 0 },
    ];
    email_jobs::enqueue(&pool, &lead.id, "welcome", &steps, now()).await.unwrap();
    assert_eq!(email_jobs::claim_due(&pool, 1, 10).await.unwrap().len(), 2);

    assert_eq!(email_jobs::reset_stale_sending(&pool).await.unwrap(), 2);
    assert_eq!(email_jobs::count(&pool, Some(EmailJobStatus::Pending)).await.unwrap(), 2);
}

#[tokio::test]
async fn test_cancel_pending_by_sequence() {
    let (_dir, pool) = setup().await;
    let lead = leads::capture(&pool, intake("rosa@example.com"), now(), YEAR)
        .await
        .unwrap()
        .lead;
    let steps = [
        PlannedStep { step_index: 0, due_at_ms: 0 },
        PlannedStep { step_index: 1, due_at_ms: 10 },
    ];
    email_jobs::enqueue(&pool, &lead.id, "welcome", &steps, now()).await.unwrap();
    email_jobs::enqueue(&pool, &lead.id, "abandoned_cart", &steps, now()).await.unwrap();

    let cancelled = email_jobs::cancel_pending_for_lead(&pool, &lead.id, Some(&["abandoned_cart"]), "paid")
        .await
        .unwrap();
    assert_eq!(cancelled, 2);
    assert_eq!(email_jobs::count(&pool, Some(EmailJobStatus::Pending)).await.unwrap(), 2);

    let cancelled = email_jobs::cancel_pending_for_lead(&pool, &lead.id, None, "unsubscribed")
        .await
        .unwrap();
    assert_eq!(cancelled, 2);

    let counts = email_jobs::counts_by_status(&pool).await.unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].status, EmailJobStatus::Cancelled);
    assert_eq!(counts[0].count, 4);
}

#[tokio::test]
async fn test_store_stats() {
    let (_dir, pool) = setup().await;
    leads::capture(&pool, intake("rosa@example.com"), now(), YEAR).await.unwrap();
    let kit = products::create(&pool, &product_input("DIY Kit", 9_900, None), now())
        .await
        .unwrap();
    let order = orders::checkout(&pool, &checkout_request(&kit.id, 1, None), 0, now())
        .await
        .unwrap();
    orders::record_payment(&pool, &order.id, PaymentStatus::Paid, now())
        .await
        .unwrap();
    orders::checkout(&pool, &checkout_request(&kit.id, 1, None), 0, now())
        .await
        .unwrap();

    let stats = stats::load_stats(&pool, now()).await.unwrap();
    assert_eq!(stats.leads.total, 1);
    assert_eq!(stats.leads.new_last_7_days, 1);
    assert_eq!(stats.leads.cold, 1);
    assert_eq!(stats.orders.total, 2);
    assert_eq!(stats.orders.paid, 1);
    assert_eq!(stats.orders.processing, 1);
    assert_eq!(stats.orders.pending, 1);
    assert_eq!(stats.orders.revenue_cents, 9_900);
    assert_eq!(stats.top_products[0].slug, "diy-kit");
}
