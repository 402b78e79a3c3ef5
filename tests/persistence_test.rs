//! Persistent lifetime: saving, restoring and clearing assignments

use std::error::Error as StdError;
use std::fmt;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use async_trait::async_trait;
use tokio::sync::Notify;

use customers_choice::kv::{FileKvStore, KvStore, MemoryKvStore};
use customers_choice::logger::Logger;
use customers_choice::persistence::{
    AssignmentStore, Assignments, CacheValidators, KvPersistence, ValidatorStore,
};
use customers_choice::{CustomersChoice, Lifetime, Variant, UNASSIGNED};

const DOCUMENT: &str = r#"{"variants":[
    {"name":"checkout","spreading":[1,1,1,1]},
    {"name":"banner","spreading":[1,1]}
]}"#;

fn engine_on<S: KvStore + 'static>(store: Arc<S>, seed: u64) -> CustomersChoice {
    let engine = CustomersChoice::builder()
        .kv_store(store)
        .namespace("shop")
        .seed(seed)
        .build()
        .unwrap();
    engine.configure_from_str(DOCUMENT).unwrap();
    engine
}

#[tokio::test]
async fn test_session_lifetime_writes_nothing() {
    let kv = Arc::new(MemoryKvStore::new());
    let engine = engine_on(kv.clone(), 1);

    engine.get_variant("checkout");
    engine.force_variant("banner", 2).unwrap();
    engine.flush().await;

    assert!(kv.is_empty());
}

#[tokio::test]
async fn test_assignments_survive_restart() {
    let kv = Arc::new(MemoryKvStore::new());

    let first = engine_on(kv.clone(), 1);
    first.set_lifetime(Lifetime::Persistent).await.unwrap();
    let checkout = first.get_variant("checkout");
    first.force_variant("banner", 2).unwrap();
    first.shutdown().await;

    // a different seed would draw differently; restored buckets win
    let second = engine_on(kv.clone(), 99);
    second.set_lifetime(Lifetime::Persistent).await.unwrap();
    assert_eq!(second.variant("checkout").unwrap().current_variant(), checkout);
    assert_eq!(second.get_variant("checkout"), checkout);
    assert_eq!(second.get_variant("banner"), 2);
}

#[tokio::test]
async fn test_switch_to_persistent_saves_session_buckets() {
    let kv = Arc::new(MemoryKvStore::new());
    let engine = engine_on(kv.clone(), 4);

    let bucket = engine.get_variant("checkout");
    engine.set_lifetime(Lifetime::Persistent).await.unwrap();
    engine.flush().await;

    assert_eq!(
        kv.get("shop.variants.checkout").await.unwrap(),
        Some(bucket.to_string())
    );
    assert_eq!(kv.get("shop.variants.banner").await.unwrap(), None);
}

#[tokio::test]
async fn test_switch_to_session_clears_store() {
    let kv = Arc::new(MemoryKvStore::new());
    let engine = engine_on(kv.clone(), 4);
    engine.set_lifetime(Lifetime::Persistent).await.unwrap();
    engine.get_variant("checkout");
    engine.flush().await;
    assert!(!kv.is_empty());

    engine.set_lifetime(Lifetime::Session).await.unwrap();
    engine.flush().await;

    assert!(kv.is_empty());
    // in-memory assignment is kept
    assert!(engine.variant("checkout").unwrap().is_assigned());
}

#[tokio::test]
async fn test_reset_all_unpersists() {
    let kv = Arc::new(MemoryKvStore::new());
    let engine = engine_on(kv.clone(), 4);
    engine.set_lifetime(Lifetime::Persistent).await.unwrap();
    engine.get_variant("checkout");
    engine.get_variant("banner");

    engine.reset_all();
    engine.flush().await;

    let persistence = KvPersistence::new(kv, "shop");
    assert!(persistence.load_assignments().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replacing_variant_without_preserve_unpersists() {
    let kv = Arc::new(MemoryKvStore::new());
    let engine = engine_on(kv.clone(), 4);
    engine.set_lifetime(Lifetime::Persistent).await.unwrap();
    engine.force_variant("banner", 1).unwrap();

    engine.add_variant(Variant::builder("banner").spreading(vec![1, 1]).build().unwrap(), false);
    engine.flush().await;

    assert_eq!(engine.variant("banner").unwrap().current_variant(), UNASSIGNED);
    assert_eq!(kv.get("shop.variants.banner").await.unwrap(), None);
}

#[tokio::test]
async fn test_stored_bucket_for_unknown_or_shrunk_variant_is_ignored() {
    let kv = Arc::new(MemoryKvStore::new());
    let persistence = KvPersistence::new(kv.clone(), "shop");
    let stored = [("banner".to_string(), 5), ("gone".to_string(), 1)].into();
    persistence.save_assignments(&stored).await.unwrap();

    let engine = engine_on(kv, 4);
    engine.set_lifetime(Lifetime::Persistent).await.unwrap();

    assert_eq!(engine.variant("banner").unwrap().current_variant(), UNASSIGNED);
    assert!(engine.variant("gone").is_none());
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("choices.json");

    let bucket = {
        let store = Arc::new(FileKvStore::open(&path).await.unwrap());
        let engine = engine_on(store, 8);
        engine.set_lifetime(Lifetime::Persistent).await.unwrap();
        let bucket = engine.get_variant("checkout");
        engine.shutdown().await;
        bucket
    };
    assert!(path.exists());

    let store = Arc::new(FileKvStore::open(&path).await.unwrap());
    let engine = engine_on(store, 1234);
    engine.set_lifetime(Lifetime::Persistent).await.unwrap();
    assert_eq!(engine.get_variant("checkout"), bucket);
}

#[tokio::test]
async fn test_writes_after_shutdown_stay_in_memory() {
    let kv = Arc::new(MemoryKvStore::new());
    let engine = engine_on(kv.clone(), 4);
    engine.set_lifetime(Lifetime::Persistent).await.unwrap();
    engine.shutdown().await;

    engine.force_variant("banner", 2).unwrap();
    engine.flush().await;

    assert_eq!(engine.get_variant("banner"), 2);
    assert_eq!(kv.get("shop.variants.banner").await.unwrap(), None);
}

/// Logger that parks the first info message mentioning `needle` until
/// released.
struct GateLogger {
    needle: &'static str,
    entered: Mutex<Option<mpsc::Sender<()>>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl Logger for GateLogger {
    fn debug(&self, _tag: &str, _message: fmt::Arguments<'_>) {}

    fn info(&self, _tag: &str, message: fmt::Arguments<'_>) {
        if !message.to_string().contains(self.needle) {
            return;
        }
        if let Some(entered) = self.entered.lock().unwrap().take() {
            entered.send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
        }
    }

    fn warn(&self, _tag: &str, _message: fmt::Arguments<'_>) {}

    fn error(
        &self,
        _tag: &str,
        _message: fmt::Arguments<'_>,
        _cause: Option<&(dyn StdError + 'static)>,
    ) {
    }
}

#[test]
fn test_stored_bucket_follows_force_order() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let _context = runtime.enter();

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let kv = Arc::new(MemoryKvStore::new());
    let engine = CustomersChoice::builder()
        .kv_store(kv.clone())
        .namespace("shop")
        .lifetime(Lifetime::Persistent)
        .logger(Arc::new(GateLogger {
            needle: "bucket 2",
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
        }))
        .build()
        .unwrap();
    engine.add_variant(Variant::builder("x").spreading(vec![1, 1]).build().unwrap(), true);

    // the first force is applied, then stalls in its log call
    let first = {
        let engine = engine.clone();
        thread::spawn(move || engine.force_variant("x", 2).unwrap())
    };
    entered_rx.recv().unwrap();
    engine.force_variant("x", 1).unwrap();
    release_tx.send(()).unwrap();
    first.join().unwrap();

    runtime.block_on(engine.flush());
    assert_eq!(engine.get_variant("x"), 1);
    assert_eq!(
        runtime.block_on(kv.get("shop.variants.x")).unwrap(),
        Some("1".to_string())
    );
}

/// Store whose load waits for a signal, recording every save.
struct ParkedStore {
    stored: Assignments,
    entered: Notify,
    release: Notify,
    saved: Mutex<Vec<Assignments>>,
}

#[async_trait]
impl AssignmentStore for ParkedStore {
    async fn save_assignments(&self, entries: &Assignments) -> customers_choice::Result<()> {
        self.saved.lock().unwrap().push(entries.clone());
        Ok(())
    }

    async fn load_assignments(&self) -> customers_choice::Result<Assignments> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.stored.clone())
    }

    async fn clear_assignments(&self) -> customers_choice::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ValidatorStore for ParkedStore {
    async fn load_validators(&self, _source_id: &str) -> customers_choice::Result<CacheValidators> {
        Ok(CacheValidators::default())
    }

    async fn save_validators(
        &self,
        _source_id: &str,
        _validators: &CacheValidators,
    ) -> customers_choice::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_bucket_forced_during_restore_is_kept() {
    let store = Arc::new(ParkedStore {
        stored: [("x".to_string(), 2)].into(),
        entered: Notify::new(),
        release: Notify::new(),
        saved: Mutex::new(Vec::new()),
    });
    let engine = CustomersChoice::builder()
        .persistence(store.clone())
        .build()
        .unwrap();
    engine.add_variant(Variant::builder("x").spreading(vec![1, 1]).build().unwrap(), true);

    let switching = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.set_lifetime(Lifetime::Persistent).await })
    };
    store.entered.notified().await;
    engine.force_variant("x", 1).unwrap();
    store.release.notify_one();
    switching.await.unwrap().unwrap();
    engine.flush().await;

    assert_eq!(engine.get_variant("x"), 1);
    let saved = store.saved.lock().unwrap();
    assert_eq!(saved.last().and_then(|entries| entries.get("x")), Some(&1));
}
