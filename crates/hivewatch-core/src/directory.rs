// ── Owned hive directory ──
//
// Resolves which hives an owner may receive alerts for, and their
// display names. The result feeds `Pipeline::set_tracked_hives`.

use std::collections::BTreeSet;
use std::future::Future;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::TrackedHive;
use crate::pipeline::Pipeline;

pub trait HiveDirectory: Send + Sync + 'static {
    fn list_owned_hive_ids(
        &self,
        owner: &str,
    ) -> impl Future<Output = Result<BTreeSet<String>, CoreError>> + Send;

    fn hive_name(&self, hive_id: &str)
    -> impl Future<Output = Result<Option<String>, CoreError>> + Send;

    /// Owned hives with names resolved. Hives whose name cannot be looked
    /// up are tracked under their id.
    fn tracked_hives(
        &self,
        owner: &str,
    ) -> impl Future<Output = Result<Vec<TrackedHive>, CoreError>> + Send {
        async move {
            let ids = self.list_owned_hive_ids(owner).await?;
            let lookups = ids.into_iter().map(|id| async move {
                let name = match self.hive_name(&id).await {
                    Ok(Some(name)) => name,
                    Ok(None) => id.clone(),
                    Err(e) => {
                        warn!(hive_id = %id, error = %e, "hive name lookup failed");
                        id.clone()
                    }
                };
                TrackedHive { id, name }
            });
            Ok(join_all(lookups).await)
        }
    }
}

/// Refresh the pipeline's tracked hive set from the directory.
pub async fn sync_owned_hives<D: HiveDirectory>(
    pipeline: &Pipeline,
    directory: &D,
    owner: &str,
) -> Result<usize, CoreError> {
    let hives = directory.tracked_hives(owner).await?;
    let count = hives.len();
    debug!(owner, count, "synced owned hives");
    pipeline.set_tracked_hives(hives).await?;
    Ok(count)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    struct StaticDirectory {
        names: HashMap<String, Option<String>>,
    }

    impl HiveDirectory for StaticDirectory {
        async fn list_owned_hive_ids(&self, owner: &str) -> Result<BTreeSet<String>, CoreError> {
            if owner != "alice" {
                return Ok(BTreeSet::new());
            }
            Ok(self.names.keys().cloned().collect())
        }

        async fn hive_name(&self, hive_id: &str) -> Result<Option<String>, CoreError> {
            match self.names.get(hive_id) {
                Some(Some(name)) if name == "broken" => Err(CoreError::Internal("boom".into())),
                Some(name) => Ok(name.clone()),
                None => Ok(None),
            }
        }
    }

    #[tokio::test]
    async fn default_tracked_hives_resolves_names() {
        let directory = StaticDirectory {
            names: HashMap::from([
                ("h1".to_owned(), Some("Orchard".to_owned())),
                ("h2".to_owned(), None),
                ("h3".to_owned(), Some("broken".to_owned())),
            ]),
        };

        let hives = directory.tracked_hives("alice").await.unwrap();
        assert_eq!(
            hives,
            vec![
                TrackedHive::new("h1", "Orchard"),
                TrackedHive::new("h2", "h2"),
                TrackedHive::new("h3", "h3"),
            ]
        );
        assert!(directory.tracked_hives("bob").await.unwrap().is_empty());
    }
}
