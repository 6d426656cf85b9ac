use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use dashboard::dispatch::SlotStatus;
use dashboard::editor::EditorBackend;
use dashboard::registry::Registry;
use dashboard::{
    BackendCache, CacheClearError, ClearOutcome, Clock, Dashboard, DataLoadError,
    Dataset, DatasetLoader, InvalidationPolicy, SchedulerState, SlotOutcome, Value, dispatch,
    maybe_clear_cache,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default)]
struct FlakyCache {
    clears: AtomicUsize,
    failing: AtomicBool,
}

impl BackendCache for FlakyCache {
    fn clear(&self) -> Result<(), CacheClearError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheClearError::Backend {
                reason: "backend unavailable".to_string(),
            });
        }
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn text(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::Text(v.to_string())).collect()
}

fn numbers(values: &[f64]) -> Vec<Value> {
    values.iter().map(|v| Value::Number(*v)).collect()
}

fn full_trial() -> Dataset {
    Dataset::from_columns(vec![
        ("alo", text(&["A", "B", "A", "B", "A", "B"])),
        ("agegrp", text(&["18-39", "40-64", "65+", "40-64", "18-39", "40-64"])),
        ("bmi2", numbers(&[22.1, 27.4, 31.0, 24.8, 19.5, 29.9])),
        ("height", numbers(&[170.0, 165.0, 180.0, 158.0, 175.0, 168.0])),
        ("weight", numbers(&[68.0, 72.5, 90.1, 55.0, 70.2, 81.3])),
    ])
}

fn outcome_of<'a>(slots: &'a [dashboard::SlotResult], id: &str) -> &'a SlotOutcome {
    &slots.iter().find(|s| s.spec_id == id).unwrap().outcome
}

fn fallback_of(slots: &[dashboard::SlotResult], id: &str) -> String {
    match outcome_of(slots, id) {
        SlotOutcome::MissingColumns { message, .. } => message.clone(),
        other => panic!("slot {} was not a fallback: {:?}", id, other),
    }
}

#[test]
fn every_standard_slot_renders_on_full_dataset() {
    let registry = Registry::standard();
    let data = full_trial();

    let slots: Vec<_> = dispatch(&data, &registry).collect();
    assert_eq!(slots.len(), 6);
    for slot in &slots {
        assert!(slot.chart().is_some(), "{} did not render: {:?}", slot.spec_id, slot.outcome);
        assert!(slot.chart().unwrap().svg.contains("<svg"));
    }
}

#[test]
fn slots_come_back_in_registry_order() {
    let registry = Registry::standard();
    let data = full_trial();

    let order: Vec<_> = dispatch(&data, &registry)
        .map(|s| (s.spec_id, s.position.row, s.position.column))
        .collect();
    assert_eq!(
        order,
        vec![
            ("allocation_pie".to_string(), 0, 0),
            ("age_histogram".to_string(), 0, 1),
            ("bmi_boxplot".to_string(), 1, 0),
            ("height_weight_scatter".to_string(), 1, 1),
            ("allocation_bar".to_string(), 2, 0),
            ("correlation_heatmap".to_string(), 2, 1),
        ]
    );
}

#[test]
fn allocation_and_age_only() {
    let registry = Registry::standard();
    let data = Dataset::from_columns(vec![
        ("alo", text(&["A", "B", "A"])),
        ("agegrp", text(&["18-39", "65+", "65+"])),
    ]);

    let slots: Vec<_> = dispatch(&data, &registry).collect();
    assert!(matches!(outcome_of(&slots, "allocation_pie"), SlotOutcome::Chart(_)));
    assert!(matches!(outcome_of(&slots, "age_histogram"), SlotOutcome::Chart(_)));
    assert!(matches!(outcome_of(&slots, "allocation_bar"), SlotOutcome::Chart(_)));
    assert_eq!(
        fallback_of(&slots, "bmi_boxplot"),
        "Required columns not found in the dataset."
    );
    assert_eq!(
        fallback_of(&slots, "height_weight_scatter"),
        "Required columns not found in the dataset."
    );
    assert_eq!(
        fallback_of(&slots, "correlation_heatmap"),
        "No numeric columns found in the dataset."
    );
}

#[test]
fn missing_allocation_uses_each_slot_message() {
    let registry = Registry::standard();
    let data = Dataset::from_columns(vec![("height", numbers(&[170.0, 160.0]))]);

    let slots: Vec<_> = dispatch(&data, &registry).collect();
    assert_eq!(
        fallback_of(&slots, "allocation_pie"),
        "Column 'alo' not found in the dataset."
    );
    assert_eq!(
        fallback_of(&slots, "age_histogram"),
        "age not found in the dataset."
    );
    assert_eq!(
        fallback_of(&slots, "allocation_bar"),
        "Allocation not found in the dataset."
    );
    assert!(matches!(outcome_of(&slots, "correlation_heatmap"), SlotOutcome::Chart(_)));

    let summary = slots[2].summary();
    assert_eq!(summary.status, SlotStatus::MissingColumns);
    assert_eq!(summary.missing, vec!["alo".to_string(), "bmi2".to_string()]);
}

#[test]
fn numeric_age_feeds_the_heatmap() {
    let registry = Registry::standard();
    let data = Dataset::from_columns(vec![
        ("alo", text(&["A", "B", "A", "B"])),
        ("agegrp", numbers(&[1.0, 2.0, 3.0, 2.0])),
    ]);

    let slots: Vec<_> = dispatch(&data, &registry).collect();
    assert!(matches!(outcome_of(&slots, "correlation_heatmap"), SlotOutcome::Chart(_)));
    assert!(matches!(outcome_of(&slots, "age_histogram"), SlotOutcome::Chart(_)));
    assert_eq!(
        fallback_of(&slots, "height_weight_scatter"),
        "Required columns not found in the dataset."
    );
}

#[test]
fn concurrent_renders_clear_once() {
    let cache = FlakyCache::default();
    let state = SchedulerState::new(TimeDelta::hours(12));

    std::thread::scope(|scope| {
        for i in 0..16 {
            let (state, cache) = (&state, &cache);
            scope.spawn(move || maybe_clear_cache(state, cache, noon() + TimeDelta::minutes(i)));
        }
    });

    assert_eq!(cache.clears.load(Ordering::SeqCst), 1);
}

#[test]
fn single_allocation_value_still_draws() {
    let registry = Registry::standard();
    let data = Dataset::from_columns(vec![("alo", text(&["A", "A", "A", "A"]))]);

    let slots: Vec<_> = dispatch(&data, &registry).collect();
    assert!(matches!(outcome_of(&slots, "allocation_pie"), SlotOutcome::Chart(_)));
    assert!(matches!(outcome_of(&slots, "allocation_bar"), SlotOutcome::Chart(_)));
}

#[test]
fn each_slot_is_chart_or_message() {
    let registry = Registry::standard();
    let data = Dataset::from_columns(vec![
        ("alo", text(&["A", "B"])),
        ("weight", numbers(&[60.0, 70.0])),
    ]);

    for slot in dispatch(&data, &registry) {
        assert_ne!(slot.chart().is_some(), slot.message().is_some(), "{}", slot.spec_id);
    }
}

#[test]
fn scheduler_clears_after_cooldown() {
    let cache = FlakyCache::default();
    let state = SchedulerState::cleared_at(TimeDelta::hours(12), noon() - TimeDelta::hours(13));

    let outcome = maybe_clear_cache(&state, &cache, noon()).unwrap();
    assert_eq!(outcome, ClearOutcome::Cleared { at: noon() });
    assert_eq!(state.last_cleared(), Some(noon()));
    assert_eq!(cache.clears.load(Ordering::SeqCst), 1);
}

#[test]
fn scheduler_waits_inside_cooldown() {
    let cache = FlakyCache::default();
    let last = noon() - TimeDelta::hours(1);
    let state = SchedulerState::cleared_at(TimeDelta::hours(12), last);

    let outcome = maybe_clear_cache(&state, &cache, noon()).unwrap();
    assert_eq!(
        outcome,
        ClearOutcome::Cooling {
            next_due: last + TimeDelta::hours(12)
        }
    );
    assert_eq!(state.last_cleared(), Some(last));
    assert_eq!(cache.clears.load(Ordering::SeqCst), 0);
}

#[test]
fn first_render_clears_unset_state() {
    let cache = FlakyCache::default();
    let state = SchedulerState::new(TimeDelta::hours(12));

    assert!(matches!(
        maybe_clear_cache(&state, &cache, noon()),
        Ok(ClearOutcome::Cleared { .. })
    ));
    assert!(matches!(
        maybe_clear_cache(&state, &cache, noon() + TimeDelta::minutes(5)),
        Ok(ClearOutcome::Cooling { .. })
    ));
    assert_eq!(cache.clears.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_clear_is_retried() {
    let cache = FlakyCache::default();
    cache.failing.store(true, Ordering::SeqCst);
    let last = noon() - TimeDelta::hours(13);
    let state = SchedulerState::cleared_at(TimeDelta::hours(12), last);

    assert!(maybe_clear_cache(&state, &cache, noon()).is_err());
    assert_eq!(state.last_cleared(), Some(last));

    cache.failing.store(false, Ordering::SeqCst);
    let later = noon() + TimeDelta::minutes(1);
    assert_eq!(
        maybe_clear_cache(&state, &cache, later).unwrap(),
        ClearOutcome::Cleared { at: later }
    );
}

fn write_trial_csv(path: &Path) {
    std::fs::write(
        path,
        "alo,agegrp,bmi2,height,weight\n\
         A,18-39,22.1,170,68\n\
         B,40-64,27.4,165,72.5\n\
         A,65+,31.0,180,90.1\n\
         B,40-64,24.8,158,55\n",
    )
    .unwrap();
}

fn dashboard_for(path: &Path, cache: Arc<FlakyCache>) -> Dashboard {
    Dashboard::new(
        DatasetLoader::new(path, InvalidationPolicy::ModifiedTime),
        Registry::standard(),
        SchedulerState::new(TimeDelta::hours(12)),
        cache,
    )
    .with_clock(Arc::new(FixedClock(noon())))
}

#[test]
fn render_loads_once_and_clears_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.csv");
    write_trial_csv(&path);
    let cache = Arc::new(FlakyCache::default());
    let dashboard = dashboard_for(&path, cache.clone());

    let first = dashboard.render().unwrap();
    let second = dashboard.render().unwrap();

    assert!(Arc::ptr_eq(&first.dataset, &second.dataset));
    assert_eq!(dashboard.loader().load_count(), 1);
    assert_eq!(first.cache, Ok(ClearOutcome::Cleared { at: noon() }));
    assert!(matches!(second.cache, Ok(ClearOutcome::Cooling { .. })));
    assert_eq!(cache.clears.load(Ordering::SeqCst), 1);
    assert_eq!(first.slots.len(), 6);
}

#[test]
fn html_page_has_overview_and_charts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.csv");
    write_trial_csv(&path);
    let dashboard = dashboard_for(&path, Arc::new(FlakyCache::default()));

    let html = dashboard.render_html();
    assert!(html.contains("Dataset Overview"));
    assert!(html.contains("4 rows"));
    assert!(html.contains("Pie Chart of Allocation"));
    assert_eq!(html.matches("<svg").count(), 6);
    assert!(!html.contains("<?xml"));
}

#[test]
fn load_failure_becomes_notice_page() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(FlakyCache::default());
    let dashboard = dashboard_for(&dir.path().join("absent.csv"), cache.clone());

    assert!(matches!(
        dashboard.render(),
        Err(DataLoadError::NotFound { .. })
    ));
    let html = dashboard.render_html();
    assert!(html.contains("The dataset could not be loaded"));
    assert!(!html.contains("<svg"));
    assert_eq!(cache.clears.load(Ordering::SeqCst), 0);
}

#[test]
fn clear_failure_keeps_charts_and_retries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.csv");
    write_trial_csv(&path);
    let cache = Arc::new(FlakyCache::default());
    cache.failing.store(true, Ordering::SeqCst);
    let dashboard = dashboard_for(&path, cache.clone());

    let rendered = dashboard.render().unwrap();
    assert!(matches!(rendered.cache, Err(CacheClearError::Backend { .. })));
    assert!(rendered.slots.iter().all(|slot| slot.chart().is_some()));
    assert_eq!(dashboard.scheduler().last_cleared(), None);

    let html = dashboard.render_html();
    assert!(html.contains("Dataset Overview"));
    assert_eq!(html.matches("<svg").count(), 6);
    assert!(html.contains("The sheet view cache could not be cleared"));

    cache.failing.store(false, Ordering::SeqCst);
    let rendered = dashboard.render().unwrap();
    assert_eq!(rendered.cache, Ok(ClearOutcome::Cleared { at: noon() }));
    assert_eq!(dashboard.scheduler().last_cleared(), Some(noon()));
    assert_eq!(cache.clears.load(Ordering::SeqCst), 1);
}

#[test]
fn single_slot_skips_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.csv");
    write_trial_csv(&path);
    let cache = Arc::new(FlakyCache::default());
    let dashboard = dashboard_for(&path, cache.clone());

    let slot = dashboard.render_slot("height_weight_scatter").unwrap().unwrap();
    assert!(slot.chart().is_some());
    assert!(dashboard.render_slot("no_such_chart").unwrap().is_none());
    assert_eq!(cache.clears.load(Ordering::SeqCst), 0);
}

#[test]
fn editor_sessions_are_dropped_by_clear() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.csv");
    write_trial_csv(&path);
    let editor = Arc::new(EditorBackend::new());
    let dashboard = Dashboard::new(
        DatasetLoader::new(&path, InvalidationPolicy::ModifiedTime),
        Registry::standard(),
        SchedulerState::cleared_at(TimeDelta::hours(12), noon() - TimeDelta::hours(20)),
        editor.clone(),
    )
    .with_clock(Arc::new(FixedClock(noon())));

    let dataset = dashboard.loader().load().unwrap();
    editor.snapshot("alice", &dataset);
    editor.snapshot("bob", &dataset);
    assert_eq!(editor.session_count(), 2);

    dashboard.render().unwrap();
    assert_eq!(editor.session_count(), 0);
}
