use tokio::sync::broadcast;

/// Rendered pages that went stale after an article changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub paths: Vec<String>,
}

/// Fan-out of page invalidations to whoever renders or caches pages.
/// Having no subscriber is normal; the event is dropped.
#[derive(Debug, Clone)]
pub struct Revalidator {
    tx: broadcast::Sender<Invalidation>,
}

impl Revalidator {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.tx.subscribe()
    }

    /// Home, the article list and each given article page.
    pub fn article_changed(&self, slugs: &[&str]) {
        let mut paths = vec!["/".to_string(), "/articles".to_string()];
        for slug in slugs {
            let path = format!("/articles/{}", slug);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        tracing::debug!(?paths, "invalidating pages");
        let _ = self.tx.send(Invalidation { paths });
    }
}

impl Default for Revalidator {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn renamed_article_invalidates_both_pages() {
        let revalidator = Revalidator::default();
        let mut rx = revalidator.subscribe();
        revalidator.article_changed(&["old", "new"]);
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.paths,
            vec!["/", "/articles", "/articles/old", "/articles/new"]
        );
    }

    #[test]
    fn sending_without_subscribers_is_fine() {
        Revalidator::default().article_changed(&["x"]);
    }
}
