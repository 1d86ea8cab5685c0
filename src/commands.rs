//! CLI subcommands wired to the orchestrator
//!
//! Both commands print JSON; upstream documents are treated as opaque values.

use std::time::Duration;

use serde_json::{json, Value};

use crate::batch::{BatchOptions, BatchResult};
use crate::key::{ItemSet, KeyBuilder};
use crate::orchestrator::CacheAside;
use crate::outcome::{FetchError, Outcome, Ttl};
use crate::upstream::{url_for_id, url_for_ids, UpstreamClient};

/// Whether an upstream document carries any data
///
/// `null`, empty arrays and empty objects are treated as a degraded response.
pub fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        _ => true,
    }
}

/// Fetches one document for the whole identifier set
///
/// An empty identifier set resolves to `null` without touching the store or
/// upstream.
pub async fn run_get(
    cache: &CacheAside,
    client: &UpstreamClient,
    builder: &KeyBuilder,
    ttl: Ttl,
    url_template: &str,
    ids: &[String],
) -> Value {
    let items = ItemSet::new(ids, builder, usize::MAX);
    let key = builder.build_key(items.iter());
    if items.is_empty() {
        return json!({ "key": key, "source": null, "value": null });
    }

    let url = url_for_ids(url_template, items.as_slice());
    let report = cache
        .get_or_compute_report(&key, ttl, || async {
            let outcome = client.fetch_json::<Value>(&url).await?;
            Ok::<_, FetchError>(match outcome {
                Outcome::Positive(value) => Outcome::validated(value, has_content),
                other => other,
            })
        })
        .await;

    json!({ "key": key, "source": report.source, "value": report.value })
}

/// Fetches one document per identifier with throttled upstream calls
pub async fn run_batch(
    cache: &CacheAside,
    client: &UpstreamClient,
    options: &BatchOptions,
    ttl: Ttl,
    throttle: Duration,
    url_template: &str,
    ids: &[String],
) -> BatchResult<Value> {
    cache
        .resolve_batch(
            ids,
            options,
            |id| options.builder.item_key(id),
            ttl,
            |id| {
                let url = url_for_id(url_template, &id);
                async move {
                    let outcome = client.fetch_json::<Value>(&url).await?;
                    Ok::<_, FetchError>(match outcome {
                        Outcome::Positive(value) => Outcome::validated(value, has_content),
                        other => other,
                    })
                }
            },
            throttle,
        )
        .await
}
