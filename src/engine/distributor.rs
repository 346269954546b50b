// ==========================================
// MOS 统计订正系统 - 时效分发器
// ==========================================
// 单一游标 + 互斥锁: 每次取出当前时效并前进一个步长
// 时效按递增顺序分发，完成顺序不确定（各时效相互独立）
// 任一工作线程遇到致命错误时置中止标志，其余线程不再领取新时效
// ==========================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub struct WorkDistributor {
    cursor: Mutex<i32>,
    end: i32,
    stride: i32,
    aborted: AtomicBool,
}

impl WorkDistributor {
    /// # 参数
    /// - start / end: 时效范围（闭区间）
    /// - stride: 步长，小于 1 按 1 处理
    pub fn new(start: i32, end: i32, stride: i32) -> Self {
        Self {
            cursor: Mutex::new(start),
            end,
            stride: stride.max(1),
            aborted: AtomicBool::new(false),
        }
    }

    /// 领取下一个时效，已分发完或已中止时返回 None
    pub fn next_step(&self) -> Option<i32> {
        if self.is_aborted() {
            return None;
        }

        let mut cursor = match self.cursor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if *cursor > self.end {
            return None;
        }

        let step = *cursor;
        *cursor += self.stride;
        Some(step)
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}
