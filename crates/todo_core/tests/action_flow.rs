use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use todo_core::{
    AdapterError, BusMessage, EventBus, StoreBusAdapter, StoreConfig, TodoAction, TodoActions,
    TodoApp, TodoChange, TodoId, TodoStore,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

#[tokio::test]
async fn create_action_persists_and_notifies() {
    let app = TodoApp::start_current(&StoreConfig::in_memory()).unwrap();
    let mut changes = collect_changes(&app);

    app.actions().create("buy milk");
    assert_eq!(next_change(&mut changes).await, TodoChange::Created);

    let listed = app.store().list_all().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "buy milk");
    assert!(!listed[0].completed);
}

#[tokio::test]
async fn toggle_and_delete_actions_notify_once_each() {
    let app = TodoApp::start_current(&StoreConfig::in_memory()).unwrap();
    let record = app.store().create("walk dog").await.unwrap();
    let mut changes = collect_changes(&app);

    app.actions().toggle_completed(record.id);
    assert_eq!(next_change(&mut changes).await, TodoChange::Toggled);
    assert!(app.store().get(record.id).await.unwrap().unwrap().completed);

    app.actions().delete(record.id);
    assert_eq!(next_change(&mut changes).await, TodoChange::Deleted);
    assert!(app.store().list_all().await.unwrap().is_empty());

    settle(&app).await;
    assert!(changes.try_recv().is_err());
}

#[tokio::test]
async fn registering_adapter_twice_does_not_duplicate_delivery() {
    let app = TodoApp::start_current(&StoreConfig::in_memory()).unwrap();
    assert!(app.adapter().is_registered());
    assert!(!app.adapter().register());
    let subscribers_before = app.bus().subscriber_count();
    assert!(!app.adapter().register());
    assert_eq!(app.bus().subscriber_count(), subscribers_before);

    let mut changes = collect_changes(&app);
    app.actions().create("only once");
    assert_eq!(next_change(&mut changes).await, TodoChange::Created);
    settle(&app).await;

    assert!(changes.try_recv().is_err());
    assert_eq!(app.store().list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_or_malformed_payloads_touch_nothing() {
    let app = TodoApp::start_current(&StoreConfig::in_memory()).unwrap();
    let existing = app.store().create("existing").await.unwrap();
    let before = app.store().list_all().await.unwrap();
    let mut changes = collect_changes(&app);

    let payloads = [
        json!({ "action": "action_archive", "item_id": existing.id.to_string() }),
        json!({ "title": "no discriminator" }),
        json!({ "action": "action_create" }),
        json!({ "action": "action_toggle_completed" }),
        json!({ "action": "action_delete", "item_id": 42 }),
        json!("not an object"),
    ];
    for payload in &payloads {
        assert!(app.actions().dispatch_payload(payload).is_err());
    }

    settle(&app).await;
    assert!(changes.try_recv().is_err());
    assert_eq!(app.store().list_all().await.unwrap(), before);
}

#[tokio::test]
async fn decoded_payload_flows_like_a_typed_action() {
    let app = TodoApp::start_current(&StoreConfig::in_memory()).unwrap();
    let mut changes = collect_changes(&app);

    app.actions()
        .dispatch_payload(&json!({ "action": "action_create", "title": "from ffi" }))
        .unwrap();
    assert_eq!(next_change(&mut changes).await, TodoChange::Created);

    let listed = app.store().list_all().await.unwrap();
    assert_eq!(listed[0].title, "from ffi");
}

// Store failures are swallowed at the adapter: the view gets no signal.
#[tokio::test]
async fn failed_store_call_publishes_no_notification() {
    let app = TodoApp::start_current(&StoreConfig::in_memory()).unwrap();
    let kept = app.store().create("kept").await.unwrap();
    let mut changes = collect_changes(&app);

    app.actions().toggle_completed(TodoId::new());
    app.actions().delete(TodoId::new());
    app.actions().create("   ");

    settle(&app).await;
    assert!(changes.try_recv().is_err());
    assert_eq!(app.store().list_all().await.unwrap(), vec![kept]);
}

#[tokio::test]
async fn degraded_store_keeps_the_flow_alive_without_notifications() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();

    let app = TodoApp::start_current(&StoreConfig::file(blocker.join("todo.db"))).unwrap();
    assert!(app.store().init_error().is_some());
    let mut changes = collect_changes(&app);

    app.actions().create("lost");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(changes.try_recv().is_err());
}

#[tokio::test]
async fn notifications_arrive_on_the_thread_driving_the_runtime() {
    let app = TodoApp::start_current(&StoreConfig::in_memory()).unwrap();
    let test_thread = std::thread::current().id();
    let seen_on = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen_on);
    app.on_change(move |_| sink.lock().unwrap().push(std::thread::current().id()));
    let mut changes = collect_changes(&app);

    app.actions().create("threaded");
    next_change(&mut changes).await;

    let seen_on = seen_on.lock().unwrap();
    assert_eq!(*seen_on, vec![test_thread]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn multi_thread_runtime_is_rejected_before_wiring_anything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todo.db");

    let Err(err) = TodoApp::start_current(&StoreConfig::file(&path)) else {
        panic!("multi-thread runtime must not drive view notifications");
    };
    assert!(matches!(err, AdapterError::UnsupportedRuntime(_)));
    assert!(!path.exists());

    let bus = EventBus::new();
    let store = TodoStore::open(&StoreConfig::in_memory());
    assert!(StoreBusAdapter::new(store, bus.clone(), Handle::current()).is_err());
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn dedicated_view_runtime_keeps_notifications_on_the_view_thread() {
    let view = std::thread::spawn(|| {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let seen_on = runtime.block_on(async {
            let app = TodoApp::start_current(&StoreConfig::in_memory()).unwrap();
            let seen_on = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen_on);
            app.on_change(move |_| sink.lock().unwrap().push(std::thread::current().id()));
            let mut changes = collect_changes(&app);

            for index in 0..20 {
                app.actions().create(format!("item {index}"));
            }
            for _ in 0..20 {
                assert_eq!(next_change(&mut changes).await, TodoChange::Created);
            }
            let seen = seen_on.lock().unwrap().clone();
            seen
        });
        (std::thread::current().id(), seen_on)
    });

    let (view_thread, seen_on) = view.join().unwrap();
    assert_ne!(view_thread, std::thread::current().id());
    assert_eq!(seen_on.len(), 20);
    assert!(seen_on.iter().all(|thread| *thread == view_thread));
}

#[tokio::test]
async fn panicking_view_subscriber_does_not_starve_the_adapter() {
    let bus = EventBus::new();
    bus.subscribe(|message| {
        if matches!(message, BusMessage::Action(_)) {
            panic!("view crashed while handling action");
        }
    });

    let store = TodoStore::open(&StoreConfig::in_memory());
    let adapter = StoreBusAdapter::new(store.clone(), bus.clone(), Handle::current()).unwrap();
    assert!(adapter.register());

    let report = bus.publish(BusMessage::Action(TodoAction::Create {
        title: "survives".to_string(),
    }));
    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 1);

    let listed = store.list_all().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "survives");
}

#[tokio::test]
async fn bus_driven_sequence_matches_reference_model() {
    let app = TodoApp::start_current(&StoreConfig::in_memory()).unwrap();
    let mut changes = collect_changes(&app);
    let mut model = ReferenceModel::default();
    let mut rng = Lcg(0x5eed_1234);

    // Step-by-step phase: learn assigned ids from the reloaded list.
    for step in 0..120 {
        match rng.next() % 4 {
            0 | 1 => {
                let title = format!("item {step}");
                app.actions().create(title.clone());
                assert_eq!(next_change(&mut changes).await, TodoChange::Created);
                let newest = app.store().list_all().await.unwrap().remove(0);
                assert_eq!(newest.title, title);
                model.create(newest.id, title);
            }
            2 => {
                let target = model.pick(&mut rng);
                app.actions().toggle_completed(target);
                if model.toggle(target) {
                    assert_eq!(next_change(&mut changes).await, TodoChange::Toggled);
                }
            }
            _ => {
                let target = model.pick(&mut rng);
                app.actions().delete(target);
                if model.delete(target) {
                    assert_eq!(next_change(&mut changes).await, TodoChange::Deleted);
                }
            }
        }
    }
    assert_eq!(snapshot(&app).await, model.items);

    // Burst phase: dispatch without waiting; the queued read sees every write.
    for _ in 0..60 {
        let target = model.pick(&mut rng);
        if rng.next() % 2 == 0 {
            app.actions().toggle_completed(target);
            model.toggle(target);
        } else {
            app.actions().delete(target);
            model.delete(target);
        }
    }
    assert_eq!(snapshot(&app).await, model.items);
}

#[tokio::test]
async fn command_input_can_be_built_from_a_bare_bus() {
    let bus = EventBus::new();
    let store = TodoStore::open(&StoreConfig::in_memory());
    StoreBusAdapter::new(store.clone(), bus.clone(), Handle::current())
        .unwrap()
        .register();

    let actions = TodoActions::new(bus);
    actions.create("a");
    actions.create("b");

    let titles: Vec<_> = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.title)
        .collect();
    assert_eq!(titles, vec!["b", "a"]);
}

#[derive(Default)]
struct ReferenceModel {
    /// Newest first, mirroring the store's display order.
    items: Vec<(TodoId, String, bool)>,
}

impl ReferenceModel {
    fn create(&mut self, id: TodoId, title: String) {
        self.items.insert(0, (id, title, false));
    }

    fn toggle(&mut self, id: TodoId) -> bool {
        match self.items.iter_mut().find(|item| item.0 == id) {
            Some(item) => {
                item.2 = !item.2;
                true
            }
            None => false,
        }
    }

    fn delete(&mut self, id: TodoId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.0 != id);
        self.items.len() != before
    }

    /// Mostly existing ids, sometimes an unknown one.
    fn pick(&self, rng: &mut Lcg) -> TodoId {
        if self.items.is_empty() || rng.next() % 5 == 0 {
            return TodoId::new();
        }
        let index = (rng.next() as usize) % self.items.len();
        self.items[index].0
    }
}

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }
}

async fn snapshot(app: &TodoApp) -> Vec<(TodoId, String, bool)> {
    app.store()
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|record| (record.id, record.title, record.completed))
        .collect()
}

fn collect_changes(app: &TodoApp) -> mpsc::UnboundedReceiver<TodoChange> {
    let (tx, rx) = mpsc::unbounded_channel();
    app.on_change(move |change| {
        let _ = tx.send(change);
    });
    rx
}

async fn next_change(rx: &mut mpsc::UnboundedReceiver<TodoChange>) -> TodoChange {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for change notification")
        .expect("change channel closed")
}

/// Waits until every queued store call and its completion have run.
async fn settle(app: &TodoApp) {
    app.store().list_all().await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
}
