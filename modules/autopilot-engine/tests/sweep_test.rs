//! End-to-end sweep tests against the in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use autopilot_common::{
    BriefOrigin, Config, ContentType, DraftStatus, LocationProfile, Plan, RecheckStatus, Tenant,
};
use autopilot_engine::plan_gate::TierPlanGate;
use autopilot_engine::review;
use autopilot_engine::testing::{
    competitor_trigger, profile, review_trigger, tenant, MemoryStore, ScriptedChecker,
    ScriptedGenerator,
};
use autopilot_engine::{Autopilot, AutopilotDeps, CallPacer, GenerationCapability, VisibilityChecker};

struct Fixture {
    store: Arc<MemoryStore>,
    tenant: Tenant,
    location: LocationProfile,
}

fn fixture(plan: Plan) -> Fixture {
    let location = profile("Charcoal N Chill", "Alpharetta", "GA");
    let tenant = tenant("Charcoal N Chill", plan);
    let store = Arc::new(
        MemoryStore::new()
            .with_profile(location.clone())
            .with_tenant(tenant.clone()),
    );
    Fixture {
        store,
        tenant,
        location,
    }
}

fn autopilot(
    store: &Arc<MemoryStore>,
    generation: GenerationCapability,
    visibility: Option<Arc<dyn VisibilityChecker>>,
) -> Autopilot {
    let deps = AutopilotDeps::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(TierPlanGate),
        generation,
        visibility,
        Config::default(),
    )
    .with_pacer(Arc::new(CallPacer::unpaced()));
    Autopilot::new(deps)
}

#[tokio::test]
async fn two_sweeps_over_the_same_signals_create_one_draft_each() {
    let f = fixture(Plan::Growth);
    let emit = |store: &MemoryStore| {
        store.push_trigger(competitor_trigger(f.tenant.id, f.location.location_id, "best hookah bar alpharetta").with_source("cmp-1"));
        store.push_trigger(review_trigger(f.tenant.id, f.location.location_id).with_source("rev-1"));
    };

    let ap = autopilot(&f.store, GenerationCapability::Unavailable, None);
    emit(&*f.store);
    let first = ap.run().await;
    assert!(f.store.pending_triggers().is_empty());

    // Producers report the same signals again before the next sweep.
    emit(&*f.store);
    let second = ap.run().await;

    assert_eq!(first.drafts_created, 2);
    assert_eq!(second.drafts_created, 0);
    assert_eq!(second.triggers_suppressed, 2);
    assert_eq!(f.store.drafts().len(), 2);
    assert!(f.store.pending_triggers().is_empty());
}

#[tokio::test]
async fn offline_sweep_writes_deterministic_faq() {
    let f = fixture(Plan::Agency);
    f.store.push_trigger(
        competitor_trigger(f.tenant.id, f.location.location_id, "best hookah bar alpharetta").with_source("cmp-1"),
    );

    let stats = autopilot(&f.store, GenerationCapability::Unavailable, None).run().await;
    assert_eq!(stats.drafts_created, 1);

    let draft = f.store.drafts().remove(0);
    assert_eq!(draft.content_type, ContentType::FaqPage);
    assert_eq!(draft.brief_origin, BriefOrigin::Offline);
    assert_eq!(draft.status, DraftStatus::Draft);
    assert!(!draft.human_approved);
    assert!(draft.body.contains("Q:") && draft.body.contains("A:"));
    assert!(draft.body.contains("Charcoal N Chill"));
    assert!(draft.body.contains("Alpharetta"));
}

#[tokio::test]
async fn dedup_read_failure_fails_open() {
    let f = fixture(Plan::Growth);
    f.store.push_trigger(competitor_trigger(f.tenant.id, f.location.location_id, "hookah").with_source("cmp-1"));
    f.store.fail_reads(true);

    let stats = autopilot(&f.store, GenerationCapability::Unavailable, None).run().await;

    // Dedup admitted the trigger; the materializer's own reads then failed it.
    assert_eq!(stats.dedup_fail_open, 1);
    assert_eq!(stats.triggers_suppressed, 0);
    assert_eq!(stats.store_failures, 1);
    assert_eq!(stats.tenants_failed, 0);
    assert!(f.store.drafts().is_empty());

    f.store.fail_reads(false);
    let retry = autopilot(&f.store, GenerationCapability::Unavailable, None).run().await;
    assert_eq!(retry.drafts_created, 1);
}

#[tokio::test]
async fn pending_cap_stops_the_sixth_draft() {
    let f = fixture(Plan::Growth);
    for i in 0..6 {
        f.store.push_trigger(
            competitor_trigger(f.tenant.id, f.location.location_id, &format!("query number {i}"))
                .with_source(format!("cmp-{i}")),
        );
    }

    let stats = autopilot(&f.store, GenerationCapability::Unavailable, None).run().await;

    assert_eq!(stats.drafts_created, 5);
    assert_eq!(stats.skipped_cap, 1);
    assert_eq!(f.store.drafts().len(), 5);
    // The capped trigger waits for reviewers to clear the queue.
    assert_eq!(f.store.pending_triggers().len(), 1);
}

#[tokio::test]
async fn tenants_below_growth_are_gated() {
    let f = fixture(Plan::Starter);
    f.store.push_trigger(competitor_trigger(f.tenant.id, f.location.location_id, "hookah").with_source("cmp-1"));

    let stats = autopilot(&f.store, GenerationCapability::Unavailable, None).run().await;

    assert_eq!(stats.tenants_gated, 1);
    assert_eq!(stats.tenants_processed, 0);
    assert_eq!(stats.triggers_received, 0);
    assert!(f.store.drafts().is_empty());
    assert_eq!(f.store.pending_triggers().len(), 1);
}

#[tokio::test]
async fn generated_drafts_share_one_pacer() {
    let f = fixture(Plan::Growth);
    for i in 0..3 {
        f.store.push_trigger(
            competitor_trigger(f.tenant.id, f.location.location_id, &format!("query number {i}"))
                .with_source(format!("cmp-{i}")),
        );
    }
    let generator = Arc::new(ScriptedGenerator::new());
    let pacer = Arc::new(CallPacer::new(Duration::from_millis(30)));
    let deps = AutopilotDeps::new(
        f.store.clone(),
        f.store.clone(),
        f.store.clone(),
        f.store.clone(),
        Arc::new(TierPlanGate),
        GenerationCapability::Available(generator.clone()),
        None,
        Config::default(),
    )
    .with_pacer(pacer.clone());

    let started = std::time::Instant::now();
    let stats = Autopilot::new(deps).run().await;

    assert_eq!(stats.drafts_created, 3);
    assert_eq!(generator.calls(), 3);
    assert_eq!(pacer.calls(), 3);
    assert!(started.elapsed() >= Duration::from_millis(60));
    assert!(f
        .store
        .drafts()
        .iter()
        .all(|d| d.brief_origin == BriefOrigin::Generated));
}

#[tokio::test]
async fn published_drafts_are_rechecked_in_isolation() {
    let f = fixture(Plan::Growth);
    f.store.push_trigger(competitor_trigger(f.tenant.id, f.location.location_id, "hookah near me").with_source("a"));
    f.store.push_trigger(competitor_trigger(f.tenant.id, f.location.location_id, "broken query").with_source("b"));
    f.store.push_trigger(competitor_trigger(f.tenant.id, f.location.location_id, "late night lounge").with_source("c"));

    let checker: Arc<dyn VisibilityChecker> = Arc::new(
        ScriptedChecker::new()
            .cited("hookah near me", true)
            .failing("broken query", "answer engine unavailable")
            .cited("late night lounge", false),
    );
    let ap = autopilot(&f.store, GenerationCapability::Unavailable, Some(checker));

    assert_eq!(ap.run().await.drafts_created, 3);
    for draft in f.store.drafts() {
        review::approve(&*f.store, draft.id, Utc::now()).await.unwrap();
        review::publish(&*f.store, draft.id, Utc::now()).await.unwrap();
    }
    assert_eq!(f.store.tasks().len(), 3);

    let summary = ap.run_rechecks().await;
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.cited, 1);

    let tasks = f.store.tasks();
    let broken = tasks.iter().find(|t| t.target_query == "broken query").unwrap();
    assert_eq!(broken.status, RecheckStatus::Pending);
    assert_eq!(broken.attempts, 1);
    assert_eq!(
        tasks.iter().filter(|t| t.status == RecheckStatus::Completed).count(),
        2
    );
}
