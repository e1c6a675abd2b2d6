use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-(user, document) mutual exclusion. Two mutations of the same document
/// id serialize; mutations of different documents or users proceed
/// independently. Entries are pruned once no holder or waiter remains.
#[derive(Default)]
pub struct DocumentLocks {
    inner: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: &str, document_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.retain(|_, entry| Arc::strong_count(entry) > 1);
            Arc::clone(
                map.entry((user_id.to_owned(), document_id.to_owned()))
                    .or_default(),
            )
        };

        lock.lock_owned().await
    }
}
