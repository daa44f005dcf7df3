use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptKey {
    pub user_id: Uuid,
    pub gacha_id: Uuid,
}

/// 从历史记录初始化之前为 `None`
pub type AttemptSlot = OwnedMutexGuard<Option<u32>>;

/// 按（用户，扭蛋机）划分的抽取计数器
///
/// 调用方在检查、抽取、记录与计数期间一直持有槽位锁，
/// 同一用户对同一扭蛋机的并发抽取依次执行，计数不会超过上限。
/// 不同的键互不阻塞。
#[derive(Clone, Default)]
pub struct AttemptCounter {
    slots: Arc<Mutex<HashMap<AttemptKey, Arc<Mutex<Option<u32>>>>>>,
}

impl AttemptCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: AttemptKey) -> AttemptSlot {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// 释放槽位；没有其他任务在等待时移出映射，下次加锁从历史记录重新初始化
    pub async fn release(&self, key: AttemptKey, slot: AttemptSlot) {
        drop(slot);
        let mut slots = self.slots.lock().await;
        // 等待中的任务持有槽位的克隆
        if let Some(entry) = slots.get(&key)
            && Arc::strong_count(entry) == 1
        {
            slots.remove(&key);
        }
    }

    /// 当前缓存的槽位数量
    pub async fn tracked(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// 读取当前计数（不排队）
    pub async fn peek(&self, key: AttemptKey) -> Option<u32> {
        let slot = {
            let slots = self.slots.lock().await;
            slots.get(&key).cloned()
        }?;
        let value = *slot.lock().await;
        value
    }
}
