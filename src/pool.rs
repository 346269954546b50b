// ==========================================
// MOS 统计订正系统 - 固定容量连接池
// ==========================================
// 用途: 权重仓储连接 / 场目录连接，在工作线程间共享
// 槽位三态: 未初始化 / 空闲 / 占用
// 获取策略:
// 1. 有空闲槽位 → 返回并标记占用
// 2. 有未初始化槽位 → 创建资源并标记占用
// 3. 全部占用 → 固定间隔休眠后重新扫描
// 约束: 容量至少为 工作线程数 + 1（主线程另持有一个句柄）
// ==========================================

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// 默认等待间隔（毫秒）
pub const DEFAULT_POOL_WAIT_MS: u64 = 100;

/// 可放入连接池的资源
pub trait Poolable: Send {
    /// 归还前清理资源上的进行中状态（如未提交事务）
    fn reset(&mut self);
}

enum Slot<T> {
    Uninitialized,
    Idle(T),
    Busy,
}

/// 固定容量连接池
///
/// 资源由工厂函数按需创建，创建后在进程生命周期内复用。
pub struct ConnectionPool<T, E> {
    slots: Mutex<Vec<Slot<T>>>,
    factory: Box<dyn Fn(usize) -> Result<T, E> + Send + Sync>,
    wait: Duration,
}

impl<T: Poolable, E: fmt::Display> ConnectionPool<T, E> {
    /// 创建连接池
    ///
    /// # 参数
    /// - capacity: 槽位数
    /// - factory: 资源工厂，参数为槽位序号
    pub fn new<F>(capacity: usize, factory: F) -> Self
    where
        F: Fn(usize) -> Result<T, E> + Send + Sync + 'static,
    {
        Self::with_wait(capacity, Duration::from_millis(DEFAULT_POOL_WAIT_MS), factory)
    }

    /// 创建连接池并指定全部占用时的等待间隔
    pub fn with_wait<F>(capacity: usize, wait: Duration, factory: F) -> Self
    where
        F: Fn(usize) -> Result<T, E> + Send + Sync + 'static,
    {
        let slots = (0..capacity).map(|_| Slot::Uninitialized).collect();
        Self {
            slots: Mutex::new(slots),
            factory: Box::new(factory),
            wait,
        }
    }

    /// 槽位总数
    pub fn capacity(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// 当前占用中的槽位数
    pub fn busy_count(&self) -> usize {
        self.slots
            .lock()
            .map(|s| s.iter().filter(|slot| matches!(slot, Slot::Busy)).count())
            .unwrap_or(0)
    }

    /// 获取一个资源句柄
    ///
    /// 无可用槽位时轮询等待；资源创建失败直接返回错误，不重试。
    pub fn acquire(&self) -> Result<PooledHandle<'_, T, E>, PoolError<E>> {
        loop {
            {
                let mut slots = self.slots.lock().map_err(|e| PoolError::Lock(e.to_string()))?;

                if let Some(index) = slots.iter().position(|s| matches!(s, Slot::Idle(_))) {
                    if let Slot::Idle(resource) = std::mem::replace(&mut slots[index], Slot::Busy) {
                        debug!(slot = index, "复用空闲连接");
                        return Ok(PooledHandle {
                            pool: self,
                            index,
                            resource: Some(resource),
                        });
                    }
                }

                if let Some(index) = slots.iter().position(|s| matches!(s, Slot::Uninitialized)) {
                    // 先占位再创建，创建失败时恢复为未初始化
                    slots[index] = Slot::Busy;
                    match (self.factory)(index) {
                        Ok(resource) => {
                            debug!(slot = index, "新建连接");
                            return Ok(PooledHandle {
                                pool: self,
                                index,
                                resource: Some(resource),
                            });
                        }
                        Err(e) => {
                            slots[index] = Slot::Uninitialized;
                            return Err(PoolError::Create(e));
                        }
                    }
                }
            }

            debug!("全部连接占用中，等待释放");
            std::thread::sleep(self.wait);
        }
    }

    fn release(&self, index: usize, mut resource: T) {
        resource.reset();
        match self.slots.lock() {
            Ok(mut slots) => {
                slots[index] = Slot::Idle(resource);
                debug!(slot = index, "连接已归还");
            }
            Err(e) => {
                tracing::error!(slot = index, error = %e, "连接池锁已损坏，连接被丢弃");
            }
        }
    }
}

/// 连接池错误
#[derive(Debug, thiserror::Error)]
pub enum PoolError<E: fmt::Display> {
    #[error("连接池锁获取失败: {0}")]
    Lock(String),

    #[error("连接创建失败: {0}")]
    Create(E),
}

/// 连接句柄，Drop 时自动归还
pub struct PooledHandle<'a, T: Poolable, E: fmt::Display> {
    pool: &'a ConnectionPool<T, E>,
    index: usize,
    resource: Option<T>,
}

impl<'a, T: Poolable, E: fmt::Display> PooledHandle<'a, T, E> {
    /// 槽位序号
    pub fn slot(&self) -> usize {
        self.index
    }
}

impl<'a, T: Poolable, E: fmt::Display> Deref for PooledHandle<'a, T, E> {
    type Target = T;

    fn deref(&self) -> &T {
        self.resource.as_ref().expect("pooled resource present until drop")
    }
}

impl<'a, T: Poolable, E: fmt::Display> DerefMut for PooledHandle<'a, T, E> {
    fn deref_mut(&mut self) -> &mut T {
        self.resource.as_mut().expect("pooled resource present until drop")
    }
}

impl<'a, T: Poolable, E: fmt::Display> Drop for PooledHandle<'a, T, E> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.release(self.index, resource);
        }
    }
}
