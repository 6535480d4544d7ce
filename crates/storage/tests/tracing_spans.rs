//! Integration test verifying that `#[instrument]` annotations produce
//! the expected spans on `MemoryKeyStore` operations.

#![allow(clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};

use keyrotor_storage::{Alg, EncryptedKey, KeyRecord, KeyStore, MemoryKeyStore};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer: records span names and fields as they are created
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut fields = FieldDump::default();
            attrs.record(&mut fields);
            self.spans.lock().expect("lock poisoned").push(format!("{}{}", span.name(), fields.0));
        }
    }
}

#[derive(Default)]
struct FieldDump(String);

impl tracing::field::Visit for FieldDump {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push_str(&format!(" {}={:?}", field.name(), value));
    }
}

fn record(kid: &str) -> KeyRecord {
    KeyRecord::builder()
        .kid(kid)
        .alg(Alg::EdDsa)
        .encrypted_key(EncryptedKey::new(vec![1; 12], vec![2; 48]))
        .build()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_store_list_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = MemoryKeyStore::new();
    store.list().await.expect("list should succeed");

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "list"), "expected a 'list' span, got: {recorded:?}");
}

#[tokio::test]
async fn memory_store_rotate_span_carries_kids() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = MemoryKeyStore::new();
    let old = record("EdDSA_old");
    store.insert(old.clone());
    store.rotate(&record("EdDSA_new"), Some(&old.deactivated())).await.expect("rotate");

    let recorded = spans.lock().expect("lock poisoned");
    let rotate = recorded
        .iter()
        .find(|s| s.starts_with("rotate"))
        .unwrap_or_else(|| panic!("expected a 'rotate' span, got: {recorded:?}"));
    assert!(rotate.contains("new_kid=EdDSA_new"), "span fields: {rotate}");
    assert!(rotate.contains("old_kid=\"EdDSA_old\""), "span fields: {rotate}");
}

#[tokio::test]
async fn span_fields_never_include_key_material() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = MemoryKeyStore::new();
    store.rotate(&record("EdDSA_quiet"), None).await.expect("rotate");

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().all(|s| !s.contains("ciphertext") && !s.contains("nonce")));
}
