use chrono::Utc;
use urlttl_core::policy::is_expired;
use urlttl_core::{Error, ExpireAfter};

use super::PolicySession;

impl PolicySession {
    /// Delete every stored response that is past its effective expiry.
    ///
    /// A `Duration` or `Never` directive registered for the entry's URL (or,
    /// failing that, its cache key) decides alone; only entries without one
    /// fall back to the session default. Pending change marks are left alone.
    ///
    /// Returns the number of deleted responses.
    pub async fn remove_expired_responses(&self) -> Result<u64, Error> {
        let now = Utc::now();
        let keys = self.store.keys().await?;
        let scanned = keys.len();

        let mut expired = Vec::new();
        for key in keys {
            // Deleted since the listing.
            let Some(entry) = self.store.get(&key).await? else {
                continue;
            };

            let directive = {
                let registry = self.registry.lock().await;
                registry.get(&entry.response.url).or_else(|| registry.get(&key))
            };
            let expiry = match directive {
                Some(ExpireAfter::Never) => None,
                Some(ExpireAfter::Duration(ttl)) => Some(ttl),
                Some(ExpireAfter::Default) | None => self.default_expiry,
            };

            if is_expired(entry.created_at, now, expiry) {
                expired.push(key);
            }
        }

        let mut removed = 0u64;
        for key in &expired {
            if self.store.delete(key).await? {
                removed += 1;
            }
        }

        tracing::info!(scanned, removed, store = self.store.name(), "removed expired responses");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use urlttl_core::ResponseStore;

    use super::super::tests::{age_entries, session_with};
    use super::*;

    const URL: &str = "https://httpbin.org/get";
    const SECOND_URL: &str = "https://httpbin.org/anything";
    const THIRD_URL: &str = "https://httpbin.org/";

    #[tokio::test]
    async fn test_registered_ttl_shadows_short_default() {
        let (session, store, _) = session_with(Some(TimeDelta::seconds(1)));
        session.register_url(SECOND_URL, ExpireAfter::seconds(10)).await.unwrap();

        session.get(URL, ExpireAfter::Default).await.unwrap();
        session.get(SECOND_URL, ExpireAfter::Default).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 2);

        age_entries(&store, 2).await;

        assert_eq!(session.remove_expired_responses().await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(session.get(SECOND_URL, ExpireAfter::Default).await.unwrap().from_cache);
    }

    #[tokio::test]
    async fn test_mixed_registrations_without_default() {
        let (session, store, _) = session_with(None);

        session.get(URL, ExpireAfter::Default).await.unwrap();
        session.register_url(SECOND_URL, ExpireAfter::seconds(2)).await.unwrap();
        session.get(SECOND_URL, ExpireAfter::Default).await.unwrap();
        session.get(THIRD_URL, ExpireAfter::seconds(10)).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 3);

        age_entries(&store, 3).await;

        assert_eq!(session.remove_expired_responses().await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_never_directive_survives_default() {
        let (session, store, _) = session_with(Some(TimeDelta::seconds(1)));
        session.get(URL, ExpireAfter::Never).await.unwrap();

        age_entries(&store, 3600).await;

        assert_eq!(session.remove_expired_responses().await.unwrap(), 0);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_registered_ttl_expires() {
        let (session, store, _) = session_with(None);
        session.get(URL, ExpireAfter::seconds(5)).await.unwrap();

        age_entries(&store, 1).await;
        assert_eq!(session.remove_expired_responses().await.unwrap(), 0);

        age_entries(&store, 5).await;
        assert_eq!(session.remove_expired_responses().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sweep_leaves_change_marks() {
        let (session, store, transport) = session_with(None);
        session.get(URL, ExpireAfter::Default).await.unwrap();
        session.register_url(URL, ExpireAfter::seconds(60)).await.unwrap();

        assert_eq!(session.remove_expired_responses().await.unwrap(), 0);
        assert_eq!(session.registry.lock().await.pending_changes(), 1);

        // The pending change still invalidates the entry on the next request.
        assert!(!session.get(URL, ExpireAfter::Default).await.unwrap().from_cache);
        assert_eq!(transport.calls(), 2);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let (session, _, _) = session_with(Some(TimeDelta::seconds(1)));
        assert_eq!(session.remove_expired_responses().await.unwrap(), 0);
    }
}
