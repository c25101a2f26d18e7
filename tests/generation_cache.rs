//! Get-or-generate flows against the in-memory store

mod common;

use base64::Engine as _;
use common::{fake_image, CountingGenerator, MisbehavingGenerator, RejectingWritesStore, UnavailableStore};
use futures::future::join_all;
use imagine_cache::cache::{fingerprint, CacheConfig, GenerationCache, PromptState, WriteMode};
use imagine_cache::store::MemoryStore;
use imagine_cache::{CacheOutcome, Error, GenerationError, ImageFormat, KvStore, PromptInput, StoreError};
use std::sync::Arc;
use std::time::Duration;

fn setup(config: CacheConfig) -> (GenerationCache, Arc<MemoryStore>, Arc<CountingGenerator>) {
    setup_with(config, CountingGenerator::new())
}

fn setup_with(
    config: CacheConfig,
    generator: CountingGenerator,
) -> (GenerationCache, Arc<MemoryStore>, Arc<CountingGenerator>) {
    let store = Arc::new(MemoryStore::default());
    let generator = Arc::new(generator);
    let cache = GenerationCache::new(config, store.clone(), generator.clone()).expect("valid config");
    (cache, store, generator)
}

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[tokio::test]
async fn test_miss_then_generate() {
    let (cache, store, generator) = setup(CacheConfig::default());
    let fp = fingerprint("a red bicycle");

    let resolved = cache.resolve("a red bicycle").await.unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(resolved.outcome, CacheOutcome::Generated);
    assert_eq!(resolved.fingerprint, fp);
    assert_eq!(resolved.bytes(), fake_image("a red bicycle").as_slice());
    assert_eq!(resolved.format(), ImageFormat::Png);

    let artifact = store.peek(&format!("image_{}", fp)).expect("artifact record written");
    assert_eq!(artifact, b64(&fake_image("a red bicycle")).into_bytes());
    assert_eq!(store.peek(fp.as_str()), Some(b"a red bicycle".to_vec()));
    assert_eq!(cache.state(&fp).await.unwrap(), PromptState::PromptAndArtifact);
}

#[tokio::test]
async fn test_existing_artifact_short_circuits_generator() {
    let (cache, store, generator) = setup(CacheConfig::default());
    let fp = fingerprint("An astronaut riding a horse");
    let stored = vec![0xff, 0xd8, 0xff, 0x00, 0x01];
    store
        .put(&cache.keys().artifact_key(&fp), b64(&stored).as_bytes())
        .await
        .unwrap();

    let resolved = cache.resolve("An astronaut riding a horse").await.unwrap();

    assert_eq!(generator.calls(), 0);
    assert!(resolved.is_hit());
    assert_eq!(resolved.bytes(), stored.as_slice());
    assert_eq!(resolved.format(), ImageFormat::Jpeg);
}

#[tokio::test]
async fn test_repeat_submission_generates_once() {
    let (cache, store, generator) = setup(CacheConfig::default());

    let first = cache.resolve("a red bicycle").await.unwrap();
    let second = cache.resolve("a red bicycle").await.unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(first.image, second.image);
    assert_eq!(second.outcome, CacheOutcome::Hit);
    // one prompt record and one artifact record
    assert_eq!(store.len(), 2);

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.generations), (1, 1, 1));
    assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_failed_generation_is_not_cached() {
    let (cache, store, generator) = setup(CacheConfig::default());
    let fp = fingerprint("broken prompt");
    generator.fail_on("broken prompt");

    let err = cache.resolve("broken prompt").await.unwrap_err();
    assert!(matches!(err, Error::Generation(GenerationError::Failed { .. })), "{:?}", err);
    assert!(!store.contains_key(&cache.keys().artifact_key(&fp)));
    assert_eq!(cache.state(&fp).await.unwrap(), PromptState::PromptOnly);
    assert_eq!(cache.stats().generation_failures, 1);

    // The retry goes back to the generator instead of a cached failure.
    generator.recover("broken prompt");
    let resolved = cache.resolve("broken prompt").await.unwrap();
    assert_eq!(generator.calls(), 2);
    assert_eq!(resolved.outcome, CacheOutcome::Generated);
    assert_eq!(cache.state(&fp).await.unwrap(), PromptState::PromptAndArtifact);
}

#[tokio::test]
async fn test_non_generation_errors_are_reported_as_generation_failures() {
    let store = Arc::new(MemoryStore::default());
    let cache = GenerationCache::new(CacheConfig::default(), store.clone(), Arc::new(MisbehavingGenerator)).unwrap();

    let err = cache.resolve("anything").await.unwrap_err();
    match err {
        Error::Generation(GenerationError::Failed { message }) => {
            assert!(message.contains("adapter misconfigured"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!store.contains_key(&cache.keys().artifact_key(&fingerprint("anything"))));
}

#[tokio::test]
async fn test_generation_timeout() {
    let config = CacheConfig::default().with_generation_timeout(Some(Duration::from_millis(50)));
    let (cache, store, generator) = setup_with(config, CountingGenerator::with_delay(Duration::from_secs(5)));

    let err = cache.resolve("a very slow prompt").await.unwrap_err();

    assert!(err.is_timeout(), "{:?}", err);
    assert_eq!(generator.calls(), 1);
    assert!(!store.contains_key(&cache.keys().artifact_key(&fingerprint("a very slow prompt"))));
}

#[tokio::test]
async fn test_corrupt_artifact_is_regenerated() {
    let (cache, store, generator) = setup(CacheConfig::default());
    let fp = fingerprint("a red bicycle");
    let artifact_key = cache.keys().artifact_key(&fp);
    store.put(&artifact_key, b"%%% not base64 %%%").await.unwrap();

    let resolved = cache.resolve("a red bicycle").await.unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(resolved.outcome, CacheOutcome::Generated);
    assert_eq!(cache.stats().corrupt_artifacts, 1);
    assert_eq!(store.peek(&artifact_key), Some(b64(&fake_image("a red bicycle")).into_bytes()));

    // Non-UTF-8 garbage is handled the same way.
    store.put(&artifact_key, &[0xff, 0xfe, 0x00]).await.unwrap();
    assert_eq!(cache.resolve("a red bicycle").await.unwrap().outcome, CacheOutcome::Generated);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn test_store_outage_propagates_without_generating() {
    let generator = Arc::new(CountingGenerator::new());
    for mode in [WriteMode::Eager, WriteMode::Lazy] {
        let cache = GenerationCache::new(
            CacheConfig::default().with_write_mode(mode),
            Arc::new(UnavailableStore),
            generator.clone(),
        )
        .unwrap();
        let err = cache.resolve("a red bicycle").await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Unavailable { .. })), "{:?}", err);
        assert_eq!(cache.stats().store_errors, 1);
    }
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_failed_write_back_returns_store_error_and_no_image() {
    let store = Arc::new(RejectingWritesStore::new("image_"));
    let generator = Arc::new(CountingGenerator::new());
    let cache = GenerationCache::new(CacheConfig::default(), store.clone(), generator.clone()).unwrap();
    let fp = fingerprint("a red bicycle");

    let err = cache.resolve("a red bicycle").await.unwrap_err();

    assert!(matches!(err, Error::Store(StoreError::Unavailable { .. })), "{:?}", err);
    assert_eq!(generator.calls(), 1);
    assert!(!store.inner.contains_key(&cache.keys().artifact_key(&fp)));
    assert!(store.inner.contains_key(&cache.keys().prompt_key(&fp)));
    assert_eq!(cache.state(&fp).await.unwrap(), PromptState::PromptOnly);
    let stats = cache.stats();
    assert_eq!((stats.generations, stats.generation_failures, stats.store_errors), (1, 0, 1));
}

#[tokio::test]
async fn test_lookup_unknown_key_is_not_found() {
    let (cache, _store, generator) = setup(CacheConfig::default());

    let found = cache.lookup_existing(fingerprint("never submitted").as_str()).await.unwrap();

    assert!(found.is_none());
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_lookup_rejects_malformed_key() {
    let (cache, _store, generator) = setup(CacheConfig::default());
    let err = cache.lookup_existing("../../etc/passwd").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_submit_then_lookup_generates_on_demand() {
    let (cache, _store, generator) = setup(CacheConfig::default());

    let fp = cache.submit("a lighthouse at dusk").await.unwrap();
    assert_eq!(fp, fingerprint("a lighthouse at dusk"));
    assert_eq!(generator.calls(), 0);
    assert_eq!(cache.state(&fp).await.unwrap(), PromptState::PromptOnly);

    let first = cache.lookup_existing(fp.as_str()).await.unwrap().expect("prompt is known");
    assert_eq!(first.outcome, CacheOutcome::Generated);
    assert_eq!(first.bytes(), fake_image("a lighthouse at dusk").as_slice());

    // The artifact key form resolves to the same record.
    let second = cache
        .lookup_existing(&cache.keys().artifact_key(&fp))
        .await
        .unwrap()
        .expect("prompt is known");
    assert!(second.is_hit());
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_lookup_generation_failure_is_retried_not_cached() {
    let (cache, store, generator) = setup(CacheConfig::default());
    let fp = cache.submit("a stormy harbour").await.unwrap();
    generator.fail_on("a stormy harbour");

    let err = cache.lookup_existing(fp.as_str()).await.unwrap_err();
    assert!(matches!(err, Error::Generation(GenerationError::Failed { .. })), "{:?}", err);
    assert!(!store.contains_key(&cache.keys().artifact_key(&fp)));
    assert_eq!(cache.state(&fp).await.unwrap(), PromptState::PromptOnly);

    generator.recover("a stormy harbour");
    let resolved = cache.lookup_existing(fp.as_str()).await.unwrap().expect("prompt is known");
    assert_eq!(resolved.outcome, CacheOutcome::Generated);
    assert_eq!(generator.calls(), 2);
    assert_eq!(cache.state(&fp).await.unwrap(), PromptState::PromptAndArtifact);
}

#[tokio::test]
async fn test_lookup_with_hex_namespace() {
    let (cache, _store, generator) = setup(CacheConfig::default().with_namespace("e"));

    let fp = cache.submit("").await.unwrap();
    assert!(fp.as_str().starts_with('e'));

    let resolved = cache.lookup_existing(fp.as_str()).await.unwrap().expect("prompt is known");
    assert_eq!(resolved.fingerprint, fp);
    assert_eq!(resolved.outcome, CacheOutcome::Generated);
    assert!(cache.lookup_existing(&cache.keys().prompt_key(&fp)).await.unwrap().unwrap().is_hit());
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_lookup_ignores_prompt_record_that_does_not_match_key() {
    let (cache, store, generator) = setup(CacheConfig::default());
    let fp = fingerprint("the real prompt");
    store.put(fp.as_str(), b"some other prompt").await.unwrap();

    assert!(cache.lookup_existing(fp.as_str()).await.unwrap().is_none());
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_lazy_mode_writes_no_prompt_record() {
    let (cache, store, generator) = setup(CacheConfig::default().with_write_mode(WriteMode::Lazy));
    let fp = fingerprint("a red bicycle");

    cache.resolve("a red bicycle").await.unwrap();

    assert!(!store.contains_key(fp.as_str()));
    assert_eq!(cache.state(&fp).await.unwrap(), PromptState::ArtifactOnly);
    assert!(cache.lookup_existing(fp.as_str()).await.unwrap().is_none());
    assert!(cache.resolve("a red bicycle").await.unwrap().is_hit());
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_namespace_prefixes_both_records() {
    let (cache, store, _generator) = setup(CacheConfig::default().with_namespace("staging:"));
    let fp = fingerprint("a red bicycle");

    cache.resolve("a red bicycle").await.unwrap();

    assert!(store.contains_key(&format!("staging:{}", fp)));
    assert!(store.contains_key(&format!("staging:image_{}", fp)));
    assert!(!store.contains_key(fp.as_str()));
}

#[tokio::test]
async fn test_invalid_input_touches_nothing() {
    let (cache, store, generator) = setup(CacheConfig::default().with_max_prompt_bytes(8));

    let err = cache.resolve("this prompt is far too long").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }));

    let body = serde_json::json!({"prompt": 42});
    assert!(matches!(PromptInput::from_field(&body, "prompt"), Err(Error::InvalidInput { .. })));

    assert!(store.is_empty());
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_empty_prompt_is_a_normal_key() {
    let (cache, _store, generator) = setup(CacheConfig::default());
    let body = serde_json::json!({"prompt": ""});
    let input = PromptInput::from_field(&body, "prompt").unwrap();

    let resolved = cache.resolve(input.as_str()).await.unwrap();

    assert_eq!(resolved.fingerprint, fingerprint(""));
    assert!(cache.resolve("").await.unwrap().is_hit());
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_misses_may_duplicate_but_agree() {
    let (cache, store, generator) = setup_with(
        CacheConfig::default(),
        CountingGenerator::with_delay(Duration::from_millis(50)),
    );

    let results = join_all((0..4).map(|_| cache.resolve("a red bicycle"))).await;

    let images: Vec<_> = results.into_iter().map(|r| r.unwrap().image).collect();
    assert!(images.windows(2).all(|w| w[0] == w[1]));
    assert!((1..=4).contains(&generator.calls()));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_single_flight_collapses_concurrent_misses() {
    let (cache, _store, generator) = setup_with(
        CacheConfig::default().with_single_flight(true),
        CountingGenerator::with_delay(Duration::from_millis(50)),
    );
    let cache = Arc::new(cache);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.resolve("a red bicycle").await })
        })
        .collect();
    let mut generated = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().outcome == CacheOutcome::Generated {
            generated += 1;
        }
    }

    assert_eq!(generator.calls(), 1);
    assert_eq!(generated, 1);
    assert_eq!(cache.in_flight(), 0);

    // Waiters that find the image after the gate count as hits only.
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (7, 1));
    assert!((stats.hit_ratio() - 0.875).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_independent_prompts_each_generate() {
    let (cache, store, generator) = setup(CacheConfig::default().with_single_flight(true));
    let prompts: Vec<String> = (0..10).map(|i| format!("prompt number {}", i)).collect();

    let results = join_all(prompts.iter().map(|p| cache.resolve(p))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(generator.calls(), 10);
    assert_eq!(store.len(), 20);
}
