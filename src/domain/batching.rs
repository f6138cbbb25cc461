//! 批次规划
//!
//! 把连续章节范围切分为固定大小的批次，批次编号从 1 开始，最后一批可以不足

use crate::domain::project::{BatchSize, ChapterRange};

/// 单个批次的计划覆盖范围（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub batch_index: u32,
    pub first_chapter: u32,
    pub last_chapter: u32,
}

impl BatchPlan {
    pub fn len(&self) -> u32 {
        self.last_chapter - self.first_chapter + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// 按批次大小切分章节范围
pub fn plan_batches(range: ChapterRange, size: BatchSize) -> Vec<BatchPlan> {
    let size = size.get();
    let mut plans = Vec::with_capacity(range.len().div_ceil(size) as usize);
    let mut first = range.start();
    let mut batch_index = 1;

    loop {
        let last = first.saturating_add(size - 1).min(range.end());
        plans.push(BatchPlan {
            batch_index,
            first_chapter: first,
            last_chapter: last,
        });
        if last >= range.end() {
            break;
        }
        first = last + 1;
        batch_index += 1;
    }

    plans
}
