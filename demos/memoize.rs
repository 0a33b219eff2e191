//! Memoization demo
//!
//! Run with `RUST_LOG=memo_cache=debug cargo run --example memoize` to see
//! when producers run. `MEMO_CACHE_LOCK_TIMEOUT_MS` sets the default lock wait.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memo_cache::invalidation::{AliasInvalidator, CacheInvalidator, KeyedCacheInvalidator};
use memo_cache::{CacheSettings, Config, InstanceCache, KeyedCache, RetrievalStrategy, SequenceKey};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memoize=info,memo_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::try_from_env().context("invalid cache configuration")?;
    let settings = Arc::new(CacheSettings::from_config(&config)?);
    info!(lock_timeout = ?settings.default_lock_timeout(), "Cache settings loaded");

    let ttl = Duration::from_secs(3600);

    // Single value, partitioned by culture.
    let greetings = Arc::new(InstanceCache::with_settings(Arc::clone(&settings)));
    let hello = greetings.get(ttl, || "Hello".to_string());
    let still_hello = greetings.get(ttl, || "World".to_string());
    let hola = greetings.get_with(ttl, || "Hola".to_string(), RetrievalStrategy::Default, ["es"]);
    info!(%hello, %still_hello, %hola, "Greetings");

    let invalidator = AliasInvalidator::new(Arc::clone(&greetings), ["greeting"]);
    invalidator.invalidate_for_aliases(&["greeting"]);
    let refreshed = greetings.get(ttl, || "Hi again".to_string());
    info!(%refreshed, "Greeting after invalidation");

    // One value per content-compared key.
    let totals = Arc::new(KeyedCache::with_settings(settings));
    let basket = SequenceKey::from(vec![3u32, 5, 8]);
    let sum = totals.try_get_with(
        &basket,
        ttl,
        |items| -> anyhow::Result<u32> {
            items
                .items()
                .iter()
                .try_fold(0u32, |acc, n| acc.checked_add(*n))
                .context("basket total overflowed")
        },
        0,
        RetrievalStrategy::Default,
        (),
    )?;
    let same_basket = SequenceKey::from(vec![3u32, 5, 8]);
    let cached = totals.get(&same_basket, ttl, |_| 0);
    info!(sum = sum.value, cached, "Basket totals");

    let by_key = AliasInvalidator::new(Arc::clone(&totals), ["basket"]);
    by_key.invalidate_for_keys(&[basket]);
    info!(
        present = ?totals.contains_key(&same_basket),
        stats = ?totals.stats(),
        "Basket cache after key invalidation"
    );

    Ok(())
}
