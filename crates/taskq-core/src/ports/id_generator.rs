//! IdGenerator port - TaskId 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース、同一ミリ秒内でも単調増加

use std::sync::Mutex;

use ulid::Ulid;

use crate::domain::TaskId;
use crate::ports::Clock;

/// Hands out ids for submitted tasks. Called from `submit` on any thread.
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// ULID ids whose timestamp part comes from the clock.
///
/// Ids sort in generation order: within the same millisecond (or if the
/// clock steps back) the previous id is incremented instead of drawing a
/// fresh random part.
pub struct UlidGenerator<C> {
    clock: C,
    last: Mutex<Option<Ulid>>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last: Mutex::new(None),
        }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let ts_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());

        let next = match *last {
            Some(prev) if prev.timestamp_ms() >= ts_ms => prev
                .increment()
                .unwrap_or_else(|| Ulid::from_parts(ts_ms, rand::random())),
            _ => Ulid::from_parts(ts_ms, rand::random()),
        };
        *last = Some(next);
        TaskId::from(next)
    }
}
