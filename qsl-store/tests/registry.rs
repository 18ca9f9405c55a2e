use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use qsl_core::QslError;
use serde_json::json;

use qsl_store::{
    registry_error, CollectionSpec, ConnectionRegistry, Document, DocumentStore, Filter,
    MemoryDriver, Query, RegistryError, StoreDriver, StoreError, StoreResult, StoreUri,
};

const TENANT: &str = "radio_card_user_507f1f77bcf86cd799439011";

/// Memory driver that records every open and can be told to fail.
#[derive(Default)]
struct TestDriver {
    inner: MemoryDriver,
    opened: Mutex<Vec<String>>,
    delay: Duration,
    failing_connects: AtomicUsize,
    failing_registrations: AtomicUsize,
}

impl TestDriver {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn opens_of(&self, database: &str) -> usize {
        self.opened.lock().iter().filter(|d| *d == database).count()
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl StoreDriver for TestDriver {
    async fn connect(&self, uri: &StoreUri) -> StoreResult<Arc<dyn DocumentStore>> {
        self.opened
            .lock()
            .push(uri.database().unwrap_or_default().to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if Self::take(&self.failing_connects) {
            return Err(StoreError::Connection("connection refused".into()));
        }

        let store = self.inner.connect(uri).await?;
        if Self::take(&self.failing_registrations) {
            return Ok(Arc::new(BrokenSchema(store)));
        }
        Ok(store)
    }
}

/// Store whose collections can never be created.
struct BrokenSchema(Arc<dyn DocumentStore>);

#[async_trait]
impl DocumentStore for BrokenSchema {
    fn database(&self) -> &str {
        self.0.database()
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> StoreResult<()> {
        Err(StoreError::Backend(format!("cannot create {}", spec.name)))
    }

    async fn insert(&self, collection: &str, doc: Document) -> StoreResult<Document> {
        self.0.insert(collection, doc).await
    }

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.0.find(collection, query).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        self.0.count(collection, filter).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.0.get(collection, id).await
    }

    async fn replace(&self, collection: &str, id: &str, doc: Document) -> StoreResult<Option<Document>> {
        self.0.replace(collection, id, doc).await
    }

    async fn patch(&self, collection: &str, id: &str, changes: Document) -> StoreResult<Option<Document>> {
        self.0.patch(collection, id, changes).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.0.delete(collection, id).await
    }

    async fn increment(&self, collection: &str, id: &str, field: &str, by: i64) -> StoreResult<i64> {
        self.0.increment(collection, id, field, by).await
    }

    async fn close(&self) {
        self.0.close().await
    }

    fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

fn registry_with(driver: &Arc<TestDriver>) -> ConnectionRegistry {
    let uri = StoreUri::parse("memory://localhost/radio-card-system").unwrap();
    ConnectionRegistry::new(Arc::clone(driver) as Arc<dyn StoreDriver>, uri)
}

fn card(callsign: &str) -> Document {
    json!({"callsign": callsign, "cardNumber": format!("24000001RC{callsign}")})
        .as_object()
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn same_name_returns_the_same_handle_with_one_open() {
    let driver = Arc::new(TestDriver::default());
    let registry = registry_with(&driver);

    let first = registry.tenant(TENANT).await.unwrap();
    let second = registry.tenant(TENANT).await.unwrap();

    assert!(first.same_connection(&second));
    assert_eq!(driver.opens_of(TENANT), 1);
    assert_eq!(registry.tenant_names(), vec![TENANT.to_string()]);
}

#[tokio::test]
async fn tenant_names_are_trimmed_before_lookup() {
    let driver = Arc::new(TestDriver::default());
    let registry = registry_with(&driver);

    let a = registry.tenant(TENANT).await.unwrap();
    let b = registry.tenant(&format!("  {TENANT} ")).await.unwrap();
    assert!(a.same_connection(&b));
    assert_eq!(driver.opens_of(TENANT), 1);
}

#[tokio::test]
async fn distinct_names_are_isolated() {
    let driver = Arc::new(TestDriver::default());
    let registry = registry_with(&driver);

    let alice = registry.tenant("radio_card_user_a").await.unwrap();
    let bob = registry.tenant("radio_card_user_b").await.unwrap();
    assert!(!alice.same_connection(&bob));

    alice.cards().insert(card("BG7XYZ")).await.unwrap();

    assert_eq!(alice.cards().count(&Filter::new()).await.unwrap(), 1);
    assert_eq!(bob.cards().count(&Filter::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn blank_name_is_rejected_without_an_entry() {
    let driver = Arc::new(TestDriver::default());
    let registry = registry_with(&driver);

    for name in ["", "   "] {
        let err = registry.tenant(name).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));
    }
    assert!(registry.tenant_names().is_empty());
    assert!(driver.opened.lock().is_empty());
}

#[tokio::test]
async fn failed_open_leaves_nothing_behind_and_is_retried() {
    let driver = Arc::new(TestDriver::default());
    driver.failing_connects.store(1, Ordering::SeqCst);
    let registry = registry_with(&driver);

    let err = registry.tenant(TENANT).await.unwrap_err();
    assert!(matches!(err, RegistryError::Connection { .. }));
    assert!(!registry.contains(TENANT));

    let handle = registry.tenant(TENANT).await.unwrap();
    assert!(!handle.is_closed());
    assert_eq!(driver.opens_of(TENANT), 2);
}

#[tokio::test]
async fn failed_registration_closes_the_connection_and_is_retried() {
    let driver = Arc::new(TestDriver::default());
    driver.failing_registrations.store(1, Ordering::SeqCst);
    let registry = registry_with(&driver);

    let err = registry.tenant(TENANT).await.unwrap_err();
    assert!(matches!(err, RegistryError::Registration { .. }));
    assert!(!registry.contains(TENANT));

    let handle = registry.tenant(TENANT).await.unwrap();
    assert_eq!(handle.cards().count(&Filter::new()).await.unwrap(), 0);
    assert_eq!(driver.opens_of(TENANT), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_open() {
    let driver = Arc::new(TestDriver::slow(Duration::from_millis(50)));
    let registry = Arc::new(registry_with(&driver));

    let tasks = (0..16).map(|_| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.tenant("radio_card_user_shared").await })
    });
    let handles: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(driver.opens_of("radio_card_user_shared"), 1);
    assert!(handles.windows(2).all(|w| w[0].same_connection(&w[1])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn startup_burst_for_one_user_opens_once() {
    let driver = Arc::new(TestDriver::slow(Duration::from_millis(20)));
    let registry = registry_with(&driver);

    let (a, b) = tokio::join!(registry.tenant(TENANT), registry.tenant(TENANT));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.same_connection(&b));
    assert_eq!(driver.opens_of(TENANT), 1);
}

#[tokio::test]
async fn administrative_requires_init() {
    let driver = Arc::new(TestDriver::default());
    let registry = registry_with(&driver);

    assert!(matches!(
        registry.administrative(),
        Err(RegistryError::NotInitialized)
    ));

    let admin = registry.init_administrative().await.unwrap();
    let again = registry.init_administrative().await.unwrap();
    assert!(admin.same_connection(&again));
    assert!(admin.same_connection(&registry.administrative().unwrap()));
    assert_eq!(driver.opens_of("radio-card-system"), 1);
    assert_eq!(admin.users().count(&Filter::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn close_all_resets_the_registry() {
    let driver = Arc::new(TestDriver::default());
    let registry = registry_with(&driver);

    let admin = registry.init_administrative().await.unwrap();
    let before = registry.tenant(TENANT).await.unwrap();

    registry.close_all().await;

    assert!(before.is_closed());
    assert!(admin.is_closed());
    assert!(registry.tenant_names().is_empty());
    assert!(matches!(
        registry.administrative(),
        Err(RegistryError::NotInitialized)
    ));

    let err = before.cards().count(&Filter::new()).await.unwrap_err();
    assert_eq!(QslError::find_in(&err).map(|e| e.code()), Some(503));

    let after = registry.tenant(TENANT).await.unwrap();
    assert!(!after.same_connection(&before));
    assert!(!after.is_closed());
    assert_eq!(driver.opens_of(TENANT), 2);
}

#[tokio::test]
async fn close_tenant_evicts_one_entry() {
    let driver = Arc::new(TestDriver::default());
    let registry = registry_with(&driver);

    let a = registry.tenant("radio_card_user_a").await.unwrap();
    let b = registry.tenant("radio_card_user_b").await.unwrap();
    a.cards().insert(card("BA1AA")).await.unwrap();

    registry.close_tenant("radio_card_user_a").await;
    registry.close_tenant("radio_card_user_missing").await;

    assert!(a.is_closed());
    assert!(!b.is_closed());
    assert_eq!(registry.tenant_names(), vec!["radio_card_user_b".to_string()]);

    let reopened = registry.tenant("radio_card_user_a").await.unwrap();
    assert_eq!(reopened.cards().count(&Filter::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn registry_errors_surface_as_service_unavailable() {
    let driver = Arc::new(TestDriver::default());
    driver.failing_connects.store(1, Ordering::SeqCst);
    let registry = registry_with(&driver);

    let err = registry_error(registry.tenant(TENANT).await.unwrap_err());
    let qsl = QslError::find_in(&err).unwrap();
    assert_eq!(qsl.code(), 503);
    assert_eq!(qsl.message, "Service temporarily unavailable");
}

#[tokio::test]
async fn from_uri_picks_the_driver_by_scheme() {
    assert!(ConnectionRegistry::from_uri("memory://localhost/radio-card-system").is_ok());
    assert!(matches!(
        ConnectionRegistry::from_uri("carrier-pigeon://roof/db"),
        Err(RegistryError::InvalidArgument(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn open_in_flight_during_close_all_stays_out() {
    let driver = Arc::new(TestDriver::slow(Duration::from_millis(50)));
    let registry = Arc::new(registry_with(&driver));

    let opening = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.tenant("radio_card_user_x").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    registry.close_all().await;

    let err = opening.await.unwrap().unwrap_err();
    assert!(matches!(err, RegistryError::Connection { .. }));
    assert!(registry.tenant_names().is_empty());

    let fresh = registry.tenant("radio_card_user_x").await.unwrap();
    assert!(!fresh.is_closed());
    assert_eq!(driver.opens_of("radio_card_user_x"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn open_in_flight_during_close_tenant_stays_out() {
    let driver = Arc::new(TestDriver::slow(Duration::from_millis(50)));
    let registry = Arc::new(registry_with(&driver));

    let opening = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.tenant(TENANT).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    registry.close_tenant(TENANT).await;

    assert!(opening.await.unwrap().is_err());
    assert!(!registry.contains(TENANT));
}

#[tokio::test]
async fn administrative_database_is_not_a_tenant() {
    let driver = Arc::new(TestDriver::default());
    let registry = registry_with(&driver);
    assert_eq!(registry.admin_database(), "radio-card-system");

    for name in ["radio-card-system", " radio-card-system "] {
        let err = registry.tenant(name).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));
    }
    assert!(registry.tenant_names().is_empty());
    assert!(driver.opened.lock().is_empty());
}
