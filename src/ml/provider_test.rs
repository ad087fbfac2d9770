//! # Model Provider Test Suite
//!
//! Uses an in-memory registry that counts fetches to check caching,
//! single-flight loading and failure handling.

use crate::error::ServiceError;
use crate::ml::{LoadedModel, LogisticRegression, ModelProvider, ModelRegistry, ModelUri};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct CountingRegistry {
  fetches: AtomicUsize,
  delay: Duration,
  failures_before_success: usize,
  failure: ServiceError,
}

impl CountingRegistry {
  fn new(delay: Duration) -> Self {
    Self {
      fetches: AtomicUsize::new(0),
      delay,
      failures_before_success: 0,
      failure: ServiceError::RegistryUnavailable("down".to_string()),
    }
  }

  fn failing(failures: usize, failure: ServiceError) -> Self {
    Self {
      failures_before_success: failures,
      failure,
      ..Self::new(Duration::ZERO)
    }
  }

  fn fetches(&self) -> usize {
    self.fetches.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ModelRegistry for CountingRegistry {
  async fn fetch(&self, uri: &ModelUri) -> Result<LoadedModel, ServiceError> {
    let attempt = self.fetches.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(self.delay).await;
    if attempt < self.failures_before_success {
      return Err(self.failure.clone());
    }
    let classifier = LogisticRegression::new(
      crate::features::FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
      vec![0.0; 5],
      1.0,
      0.5,
    )?;
    Ok(LoadedModel::new(uri.clone(), Some("1".to_string()), Box::new(classifier)))
  }
}

fn provider(registry: Arc<CountingRegistry>, timeout: Duration) -> ModelProvider {
  ModelProvider::new(registry, ModelUri::new("titanic", "staging"), timeout)
}

#[tokio::test]
async fn test_second_call_uses_cache() {
  let registry = Arc::new(CountingRegistry::new(Duration::ZERO));
  let provider = provider(registry.clone(), Duration::from_secs(5));
  assert!(!provider.is_loaded());

  let first = provider.get_model().await.unwrap();
  let second = provider.get_model().await.unwrap();

  assert!(Arc::ptr_eq(&first, &second));
  assert_eq!(registry.fetches(), 1);
  assert!(provider.is_loaded());
  assert_eq!(provider.uri().to_string(), "models:/titanic/staging");
}

#[tokio::test]
async fn test_concurrent_callers_share_one_fetch() {
  let registry = Arc::new(CountingRegistry::new(Duration::from_millis(50)));
  let provider = Arc::new(provider(registry.clone(), Duration::from_secs(5)));

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let provider = Arc::clone(&provider);
      tokio::spawn(async move { provider.get_model().await })
    })
    .collect();
  let models: Vec<Arc<LoadedModel>> = futures::future::join_all(handles)
    .await
    .into_iter()
    .map(|joined| joined.unwrap().unwrap())
    .collect();

  assert_eq!(registry.fetches(), 1);
  assert!(models.iter().all(|m| Arc::ptr_eq(m, &models[0])));
}

#[tokio::test]
async fn test_failed_load_is_retried() {
  let registry = Arc::new(CountingRegistry::failing(
    1,
    ServiceError::RegistryUnavailable("connection refused".to_string()),
  ));
  let provider = provider(registry.clone(), Duration::from_secs(5));

  let err = provider.get_model().await.unwrap_err();
  assert!(err.is_retryable());
  assert!(!provider.is_loaded());

  provider.get_model().await.unwrap();
  assert_eq!(registry.fetches(), 2);
  assert!(provider.is_loaded());
}

#[tokio::test]
async fn test_model_not_found_propagates() {
  let registry = Arc::new(CountingRegistry::failing(
    usize::MAX,
    ServiceError::ModelNotFound("models:/titanic/staging".to_string()),
  ));
  let provider = provider(registry, Duration::from_secs(5));
  let err = provider.get_model().await.unwrap_err();
  assert!(matches!(err, ServiceError::ModelNotFound(_)));
  assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_slow_registry_times_out() {
  let registry = Arc::new(CountingRegistry::new(Duration::from_secs(10)));
  let provider = provider(registry, Duration::from_millis(20));
  let err = provider.get_model().await.unwrap_err();
  assert!(matches!(err, ServiceError::RegistryUnavailable(ref msg) if msg.contains("timed out")));
  assert!(!provider.is_loaded());
}
