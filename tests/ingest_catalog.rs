//! End-to-end runs: fake sessions, checkpoint file and a temporary catalog.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use common::{date, full_days, FakeDay, FakeSessions, FakeVenue};
use menuscrape::config::RetryPolicy;
use menuscrape::models::{Course, Day, Meal, RawIngredients, Venue};
use menuscrape::overrides::{NameOverrides, OverrideConfig};
use menuscrape::repository::{
    run_migrations, AsyncSqlitePool, DieselCatalogRepository, DieselVenueRepository,
};
use menuscrape::scrapers::{CancellationFlag, CheckpointStore, ScrapeError, TraversalOptions};
use menuscrape::services::{IngestService, ScrapeEvent, ScrapeOptions, ScrapeService};
use tempfile::TempDir;
use tokio::sync::mpsc;

struct Harness {
    dir: TempDir,
    pool: AsyncSqlitePool,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("menus.db"));
        run_migrations(&pool).await.unwrap();
        let venues = DieselVenueRepository::new(pool.clone());
        for (id, name) in [("BK", "Berkeley"), ("ES", "Ezra Stiles"), ("MC", "Morse")] {
            venues.upsert(&Venue::new(id, name, name)).await.unwrap();
        }
        Self { dir, pool }
    }

    fn checkpoint(&self) -> CheckpointStore {
        CheckpointStore::load(self.dir.path().join("menus.json")).unwrap()
    }

    fn catalog(&self) -> DieselCatalogRepository {
        DieselCatalogRepository::new(self.pool.clone())
    }

    fn ingest(&self) -> IngestService {
        IngestService::new(self.pool.clone(), NameOverrides::default(), 2)
    }

    fn service(&self, sessions: Arc<FakeSessions>, venue_ids: Vec<u32>, attempts: u32) -> ScrapeService {
        ScrapeService::new(
            sessions,
            self.ingest(),
            ScrapeOptions {
                venue_ids,
                traversal: TraversalOptions {
                    settle_delay: Duration::ZERO,
                    min_meals: 2,
                    max_seek_steps: 50,
                },
                retry: RetryPolicy::immediate(attempts),
                ingest: true,
            },
        )
    }
}

async fn run(
    service: &ScrapeService,
    checkpoint: &mut CheckpointStore,
) -> (menuscrape::models::RunStats, Vec<ScrapeEvent>) {
    let (tx, mut rx) = mpsc::channel(16);
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    });
    let stats = service
        .run(checkpoint, CancellationFlag::new(), tx)
        .await
        .unwrap();
    (stats, collector.await.unwrap())
}

fn venue(caption: &str, days: Vec<FakeDay>) -> FakeVenue {
    FakeVenue {
        caption: caption.to_string(),
        days,
        start: 0,
    }
}

#[tokio::test]
async fn run_scrapes_and_ingests_one_venue() {
    let h = Harness::new().await;
    let mut days = full_days(date(1), 3);
    days.push(FakeDay::sparse(date(4)));
    let sessions = Arc::new(FakeSessions::new(vec![(1, venue("Berkeley, Residential", days))]));
    let service = h.service(sessions.clone(), vec![1], 3);
    let mut checkpoint = h.checkpoint();

    let (stats, _) = run(&service, &mut checkpoint).await;

    assert!(!stats.aborted);
    let berkeley = &stats.venues["Berkeley"];
    assert_eq!(berkeley.found.days, 3);
    assert_eq!(berkeley.found.meals, 9);
    assert_eq!(berkeley.inserted.meals, 9);
    // Brownie, Chicken Tikka, Fruit Cup
    assert_eq!(berkeley.inserted.items, 3);
    assert_eq!(berkeley.end_day, Some(date(3)));
    assert_eq!(berkeley.restarts, 0);
    assert!(berkeley.error.is_none());

    let catalog = h.catalog();
    let meals = catalog.meals_on("BK", date(2)).await.unwrap();
    let names: Vec<&str> = meals.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Breakfast", "Dinner", "Lunch"]);
    let dinner = meals.iter().find(|m| m.name == "Dinner").unwrap();
    assert_eq!(dinner.start_time.as_deref(), Some("17:00"));

    let items = catalog.items_for_meal(dinner.id).await.unwrap();
    assert_eq!(items.len(), 3);
    let brownie = catalog.items_named("Baker's Brownie").await.unwrap();
    assert_eq!(brownie.len(), 1);
    assert_eq!(brownie[0].key.course, "Dessert");
    assert!(brownie[0].key.flags.tree_nut);

    let (header, values) = catalog.nutrition_for(brownie[0].id).await.unwrap().unwrap();
    assert_eq!(header.calories, Some(250));
    assert_eq!(header.serving_size.as_deref(), Some("1 each"));
    let sodium = values.iter().find(|v| v.nutrient == "sodium").unwrap();
    assert_eq!(sodium.amount, "135 mg");

    assert_eq!(sessions.log.opened.load(Ordering::SeqCst), 1);
    assert_eq!(sessions.log.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn configured_overrides_are_applied_once() {
    let h = Harness::new().await;
    let mut config = OverrideConfig::default();
    config.meals.insert("Dinner".into(), "Evening".into());
    config.courses.insert("Dessert".into(), "Sweets".into());
    let ingest = IngestService::new(h.pool.clone(), NameOverrides::with_config(&config), 2);
    let sessions = Arc::new(FakeSessions::new(vec![(1, venue("Berkeley", full_days(date(1), 1)))]));
    let service = ScrapeService::new(
        sessions,
        ingest,
        ScrapeOptions {
            venue_ids: vec![1],
            traversal: TraversalOptions {
                settle_delay: Duration::ZERO,
                min_meals: 2,
                max_seek_steps: 50,
            },
            retry: RetryPolicy::immediate(1),
            ingest: true,
        },
    );
    let mut checkpoint = h.checkpoint();

    run(&service, &mut checkpoint).await;

    // "OC Dinner" maps to "Dinner"; the configured "Dinner" entry is not chained onto it.
    let meals = h.catalog().meals_on("BK", date(1)).await.unwrap();
    let names: Vec<&str> = meals.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Breakfast", "Dinner", "Lunch"]);
    let brownie = h.catalog().items_named("Baker's Brownie").await.unwrap();
    assert_eq!(brownie[0].key.course, "Dessert");
    assert_eq!(checkpoint.days("Berkeley")[0].meals[2].name, "OC Dinner");
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let h = Harness::new().await;
    let sessions = Arc::new(FakeSessions::new(vec![(1, venue("Berkeley", full_days(date(1), 3)))]));
    let service = h.service(sessions.clone(), vec![1], 3);

    let mut checkpoint = h.checkpoint();
    run(&service, &mut checkpoint).await;
    let items_before = h.catalog().item_count().await.unwrap();
    let scraped_before = sessions.log.scraped().len();

    let mut checkpoint = h.checkpoint();
    let (stats, _) = run(&service, &mut checkpoint).await;

    let berkeley = &stats.venues["Berkeley"];
    assert_eq!(berkeley.found.days, 0);
    assert_eq!(berkeley.inserted.meals, 0);
    assert_eq!(sessions.log.scraped().len(), scraped_before);
    assert_eq!(h.catalog().item_count().await.unwrap(), items_before);
    assert_eq!(checkpoint.days("Berkeley").len(), 3);
}

#[tokio::test]
async fn stale_catalog_resumes_at_first_published_day() {
    let h = Harness::new().await;
    let before = Arc::new(FakeSessions::new(vec![(1, venue("Berkeley", full_days(date(1), 2)))]));
    let mut checkpoint = h.checkpoint();
    run(&h.service(before, vec![1], 3), &mut checkpoint).await;

    // A week later the site only publishes Oct 10 onwards.
    let later = Arc::new(FakeSessions::new(vec![(1, venue("Berkeley", full_days(date(10), 3)))]));
    let mut checkpoint = h.checkpoint();
    let (stats, _) = run(&h.service(later.clone(), vec![1], 3), &mut checkpoint).await;

    let berkeley = &stats.venues["Berkeley"];
    assert_eq!(berkeley.restarts, 0);
    assert!(!berkeley.is_failed());
    assert_eq!(berkeley.found.days, 3);
    assert_eq!(berkeley.end_day, Some(date(12)));
    assert_eq!(later.log.scraped(), vec![date(10), date(11), date(12)]);
}

#[tokio::test]
async fn retryable_failure_restarts_venue() {
    let h = Harness::new().await;
    let sessions = Arc::new(FakeSessions::new(vec![(1, venue("Berkeley", full_days(date(1), 4)))]));
    sessions.log.push_fault(date(3), ScrapeError::ClickIntercepted);
    let service = h.service(sessions.clone(), vec![1], 3);
    let mut checkpoint = h.checkpoint();

    let (stats, events) = run(&service, &mut checkpoint).await;

    let berkeley = &stats.venues["Berkeley"];
    assert_eq!(berkeley.restarts, 1);
    assert_eq!(berkeley.found.days, 4);
    assert!(berkeley.error.is_none());
    assert_eq!(stats.total_restarts(), 1);
    assert_eq!(
        sessions.log.scraped(),
        vec![date(1), date(2), date(3), date(3), date(4)]
    );
    assert_eq!(sessions.log.opened.load(Ordering::SeqCst), 2);
    assert_eq!(sessions.log.closed.load(Ordering::SeqCst), 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, ScrapeEvent::Restarting { attempt: 1, .. })));
}

#[tokio::test]
async fn exhausted_retries_fail_venue_but_not_run() {
    let h = Harness::new().await;
    let sessions = Arc::new(FakeSessions::new(vec![
        (1, venue("Berkeley", full_days(date(1), 3))),
        (7, venue("Morse", full_days(date(1), 2))),
    ]));
    for _ in 0..5 {
        sessions.log.push_fault(date(2), ScrapeError::NotInteractable);
    }
    let service = h.service(sessions.clone(), vec![1, 7], 3);
    let mut checkpoint = h.checkpoint();

    let (stats, _) = run(&service, &mut checkpoint).await;

    assert!(!stats.aborted);
    let berkeley = &stats.venues["Berkeley"];
    assert_eq!(berkeley.restarts, 2);
    assert!(berkeley.is_failed());
    // Oct 1 was completed before the failures and is still ingested.
    assert_eq!(berkeley.found.days, 1);
    assert_eq!(berkeley.end_day, Some(date(1)));
    assert_eq!(stats.failed_venues(), vec!["Berkeley"]);

    // Two faults remain queued for Oct 2; Morse hits both, then succeeds on its third attempt.
    let morse = &stats.venues["Morse"];
    assert_eq!(morse.restarts, 2);
    assert!(!morse.is_failed());
    assert_eq!(morse.end_day, Some(date(2)));
}

#[tokio::test]
async fn fatal_error_aborts_run() {
    let h = Harness::new().await;
    let sessions = Arc::new(FakeSessions::new(vec![(7, venue("Morse", full_days(date(1), 2)))]));
    let service = h.service(sessions, vec![3, 7], 3);
    let mut checkpoint = h.checkpoint();

    let (stats, events) = run(&service, &mut checkpoint).await;

    assert!(stats.aborted);
    assert!(stats.venues["venue 3"].is_failed());
    assert!(!stats.venues.contains_key("Morse"));
    assert!(events.iter().any(|e| matches!(e, ScrapeEvent::Aborted { .. })));
}

#[tokio::test]
async fn combined_venue_is_split_into_both_catalog_venues() {
    let h = Harness::new().await;
    let sessions = Arc::new(FakeSessions::new(vec![(
        11,
        venue("Stiles and Morse", full_days(date(1), 2)),
    )]));
    let service = h.service(sessions, vec![11], 3);
    let mut checkpoint = h.checkpoint();

    let (stats, _) = run(&service, &mut checkpoint).await;

    let names: Vec<&String> = stats.venues.keys().collect();
    assert_eq!(names, vec!["Ezra Stiles", "Morse"]);
    for name in ["Ezra Stiles", "Morse"] {
        assert_eq!(stats.venues[name].found.days, 2);
        assert_eq!(stats.venues[name].inserted.meals, 6);
        assert_eq!(checkpoint.days(name).len(), 2);
    }
    assert!(checkpoint.days("Stiles and Morse").is_empty());

    let catalog = h.catalog();
    assert_eq!(catalog.meals_on("ES", date(1)).await.unwrap().len(), 3);
    assert_eq!(catalog.meals_on("MC", date(2)).await.unwrap().len(), 3);
    // Items are shared between the two venues.
    assert_eq!(catalog.item_count().await.unwrap(), 3);
}

fn granola_day(d: NaiveDate, allergens: Option<&str>) -> Day {
    let mut course = Course {
        name: "Breakfast Bar".to_string(),
        ..Default::default()
    };
    course.ingredients.insert(
        "Granola".to_string(),
        RawIngredients {
            diets: "V".to_string(),
            ingredients: "oats, honey, almonds".to_string(),
            allergens: allergens.map(str::to_string),
        },
    );
    let meal = |name: &str| Meal {
        name: name.to_string(),
        courses: vec![course.clone()],
    };
    Day {
        date: d,
        meals: vec![meal("Breakfast"), meal("Lunch")],
    }
}

#[tokio::test]
async fn tree_nut_observations_collapse_into_one_item() {
    let h = Harness::new().await;
    let ingest = h.ingest();

    let days = vec![
        granola_day(date(1), Some("Wheat")),
        granola_day(date(2), Some("Tree Nut, Wheat")),
        granola_day(date(3), Some("Wheat")),
    ];
    let report = ingest.ingest_venue("Berkeley", &days).await.unwrap();

    assert_eq!(report.totals.items_inserted, 1);
    assert_eq!(report.totals.tree_nut_upgrades, 1);

    let granola = h.catalog().items_named("Granola").await.unwrap();
    assert_eq!(granola.len(), 1);
    assert!(granola[0].key.flags.tree_nut);
    assert!(granola[0].key.flags.wheat);

    let meals = h.catalog().meals_on("BK", date(3)).await.unwrap();
    let linked = h.catalog().items_for_meal(meals[0].id).await.unwrap();
    assert_eq!(linked[0].id, granola[0].id);
}

#[tokio::test]
async fn ingest_checkpoint_splits_combined_keys() {
    let h = Harness::new().await;
    let mut checkpoint = h.checkpoint();
    checkpoint
        .append_day("Ezra Stiles/Morse", granola_day(date(5), None))
        .unwrap();
    checkpoint
        .append_day("Nowhere Hall", granola_day(date(5), None))
        .unwrap();

    let reports = h.ingest().ingest_checkpoint(&checkpoint).await.unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports["Ezra Stiles"].venue_id, "ES");
    assert_eq!(reports["Morse"].totals.meals_inserted, 2);
    assert_eq!(reports["Ezra Stiles"].last_date, Some(date(5)));
}
