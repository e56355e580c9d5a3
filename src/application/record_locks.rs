//! 絵画IDごとの排他制御
//!
//! 同じ絵画への変更は直列に実行する。異なる絵画への変更は並行して実行できる。

use crate::domain::painting::entities::PaintingId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::OwnedMutexGuard;
use tracing::trace;

/// 絵画IDごとのロックの登録簿
#[derive(Default)]
pub struct RecordLocks {
    locks: Mutex<HashMap<PaintingId, Weak<tokio::sync::Mutex<()>>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定した絵画のロックを取得する。ガードを破棄するまで他の変更は待機する
    pub async fn lock(&self, id: &PaintingId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|_, weak| weak.strong_count() > 0);
            match locks.get(id).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let created = Arc::new(tokio::sync::Mutex::new(()));
                    locks.insert(id.clone(), Arc::downgrade(&created));
                    created
                }
            }
        };
        trace!(painting_id = %id, "絵画のロックを待機");
        mutex.lock_owned().await
    }

    /// 使用中のロックの数
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.values().filter(|weak| weak.strong_count() > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_record_is_serialized() {
        let locks = Arc::new(RecordLocks::new());
        let id = PaintingId::generate();

        let guard = locks.lock(&id).await;
        let waiting = {
            let locks = locks.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_records_do_not_block() {
        let locks = RecordLocks::new();
        let _a = locks.lock(&PaintingId::generate()).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.lock(&PaintingId::generate()))
            .await
            .expect("別の絵画のロックは待機しない");
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let locks = RecordLocks::new();
        {
            let _guard = locks.lock(&PaintingId::generate()).await;
        }
        assert_eq!(locks.active(), 0);
    }
}
