//! 纹理图集槽位表
//!
//! 固定容量，按纹理键先到先得地分配槽位，没有淘汰策略。槽位耗尽时
//! 对应批次跳过图集优化，记录一次未命中。

use std::collections::HashMap;

#[derive(Debug)]
pub struct TextureAtlas {
    slots: HashMap<String, usize>,
    free: Vec<usize>,
    capacity: usize,
    misses: u64,
}

impl TextureAtlas {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(capacity),
            // 反序存放，先分配低位槽
            free: (0..capacity).rev().collect(),
            capacity,
            misses: 0,
        }
    }

    /// 取得纹理的槽位，未登记时从空闲列表分配
    ///
    /// # 返回
    ///
    /// 槽位已满时返回 `None`。
    pub fn slot_for(&mut self, texture: &str) -> Option<usize> {
        if let Some(&slot) = self.slots.get(texture) {
            return Some(slot);
        }
        match self.free.pop() {
            Some(slot) => {
                self.slots.insert(texture.to_string(), slot);
                Some(slot)
            }
            None => {
                self.misses += 1;
                tracing::trace!(target: "batching", "Atlas full, skipping slot for '{}'", texture);
                None
            }
        }
    }

    /// 显式归还槽位
    pub fn release(&mut self, texture: &str) -> bool {
        match self.slots.remove(texture) {
            Some(slot) => {
                self.free.push(slot);
                true
            }
            None => false,
        }
    }

    pub fn used(&self) -> usize {
        self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn reset_misses(&mut self) {
        self.misses = 0;
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free = (0..self.capacity).rev().collect();
        self.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_come_allocation() {
        let mut atlas = TextureAtlas::new(2);
        assert_eq!(atlas.slot_for("a"), Some(0));
        assert_eq!(atlas.slot_for("b"), Some(1));
        assert_eq!(atlas.slot_for("a"), Some(0));

        // 没有淘汰
        assert_eq!(atlas.slot_for("c"), None);
        assert_eq!(atlas.misses(), 1);
        assert_eq!(atlas.used(), 2);

        assert!(atlas.release("a"));
        assert_eq!(atlas.slot_for("c"), Some(0));
    }

    #[test]
    fn test_zero_capacity() {
        let mut atlas = TextureAtlas::new(0);
        assert_eq!(atlas.slot_for("a"), None);
        assert_eq!(atlas.misses(), 1);
    }
}
