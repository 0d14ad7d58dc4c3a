//! Cache keys for every resource the console reads.

use query_cache::{QueryCache, QueryKey};
use secretary_client::{ChannelKind, LogQuery};

pub fn instances(kind: ChannelKind) -> QueryKey {
    QueryKey::new("instances").with("channel", kind)
}

pub fn instance(kind: ChannelKind, id: &str) -> QueryKey {
    QueryKey::new("instance").with("channel", kind).with("id", id)
}

pub fn instance_status(kind: ChannelKind, id: &str) -> QueryKey {
    QueryKey::new("instance_status").with("channel", kind).with("id", id)
}

/// Status of a long-running backend job (`scan`, `download`, `training`).
pub fn operation(name: &str) -> QueryKey {
    QueryKey::new("operation").with("name", name)
}

/// One page of `source` logs (`audit` or `usage`); without a query, every page.
pub fn logs(source: &str, query: Option<&LogQuery>) -> QueryKey {
    let key = QueryKey::new("logs").with("source", source);
    match query {
        Some(query) => query
            .pairs()
            .into_iter()
            .fold(key, |key, (name, value)| key.with(name, value)),
        None => key,
    }
}

pub fn usage_stats() -> QueryKey {
    QueryKey::new("usage_stats")
}

pub fn llm_backend() -> QueryKey {
    QueryKey::new("llm_backend")
}

pub fn personas() -> QueryKey {
    QueryKey::new("personas")
}

pub fn tts_presets() -> QueryKey {
    QueryKey::new("tts_presets")
}

pub fn gsm_status() -> QueryKey {
    QueryKey::new("gsm_status")
}

/// Register the invalidation edges between keys.
///
/// Changing an instance makes its status stale; removing usage logs makes the
/// aggregate stats stale.
pub async fn register_dependencies(cache: &QueryCache) {
    for kind in ChannelKind::ALL {
        cache
            .depends_on(
                QueryKey::new("instance").with("channel", kind),
                [QueryKey::new("instance_status").with("channel", kind)],
            )
            .await;
    }
    cache.depends_on(logs("usage", None), [usage_stats()]).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_page_keys_select_under_source() {
        let query = LogQuery {
            limit: 20,
            offset: 40,
            action: Some("delete".into()),
            ..Default::default()
        };
        let page = logs("audit", Some(&query));

        assert_eq!(page.param("offset"), Some("40"));
        assert!(logs("audit", None).matches(&page));
        assert!(!logs("usage", None).matches(&page));
    }

    #[test]
    fn test_instance_keys_scoped_by_channel() {
        let telegram = instance(ChannelKind::Telegram, "1");
        let widget = instance(ChannelKind::Widget, "1");
        assert_ne!(telegram, widget);
        assert!(QueryKey::new("instance").with("channel", ChannelKind::Telegram).matches(&telegram));
    }
}
