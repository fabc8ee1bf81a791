use serde::Serialize;

/// 对象句柄：槽位索引 + 代数
///
/// 槽位被释放后代数递增，旧句柄随之失效，不会读到已被复用的对象。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaHandle {
    index: u32,
    generation: u32,
}

impl ArenaHandle {
    /// 槽位索引
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

struct Slot<T> {
    value: T,
    generation: u32,
    live: bool,
}

/// 对象池统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArenaStats {
    /// 新分配的槽位数
    pub allocations: u64,
    /// 从空闲列表复用的次数
    pub reuses: u64,
    /// 超出容量、释放时被丢弃的槽位数
    pub drops: u64,
}

/// 带空闲列表的对象竞技场
///
/// 分配时优先弹出空闲索引，否则在末尾新增槽位；最多保留 `capacity` 个槽位，
/// 超出部分在释放时直接丢弃，池不会无限增长。
pub struct ObjectArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    capacity: usize,
    /// 新槽位的起始代数，保证被丢弃槽位的旧句柄不会在索引复用后复活
    generation_floor: u32,
    stats: ArenaStats,
}

impl<T: Default> ObjectArena<T> {
    /// 创建对象池
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            capacity,
            generation_floor: 0,
            stats: ArenaStats::default(),
        }
    }

    /// 获取一个对象
    ///
    /// 复用的对象保留上一次的内容（以便复用其内部缓冲区），由调用方负责清空。
    pub fn acquire(&mut self) -> (ArenaHandle, &mut T) {
        let index = match self.free.pop() {
            Some(index) => {
                self.stats.reuses += 1;
                index
            }
            None => {
                self.stats.allocations += 1;
                self.slots.push(Slot {
                    value: T::default(),
                    generation: self.generation_floor,
                    live: false,
                });
                self.slots.len() - 1
            }
        };

        let slot = &mut self.slots[index];
        slot.live = true;
        let handle = ArenaHandle {
            index: index as u32,
            generation: slot.generation,
        };
        (handle, &mut slot.value)
    }

    /// 将对象归还到池中
    ///
    /// 句柄无效（已释放或过期）时返回 `false`。
    pub fn release(&mut self, handle: ArenaHandle) -> bool {
        let index = handle.index();
        match self.slots.get_mut(index) {
            Some(slot) if slot.live && slot.generation == handle.generation => {
                slot.live = false;
                slot.generation = slot.generation.wrapping_add(1);
            }
            _ => return false,
        }

        if index < self.capacity {
            self.free.push(index);
        } else {
            self.stats.drops += 1;
            self.trim_overflow();
        }
        true
    }

    /// 丢弃容量之外、末尾已释放的槽位
    fn trim_overflow(&mut self) {
        while self.slots.len() > self.capacity {
            match self.slots.last() {
                Some(slot) if !slot.live => {
                    self.generation_floor = self.generation_floor.max(slot.generation);
                    self.slots.pop();
                }
                _ => break,
            }
        }
    }

    pub fn get(&self, handle: ArenaHandle) -> Option<&T> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.live && slot.generation == handle.generation)
            .map(|slot| &slot.value)
    }

    pub fn get_mut(&mut self, handle: ArenaHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.live && slot.generation == handle.generation)
            .map(|slot| &mut slot.value)
    }

    /// 正在使用的对象数
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.live).count()
    }

    /// 空闲列表中的对象数
    pub fn available_count(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> ArenaStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ArenaStats::default();
    }

    /// 清空池，所有句柄失效
    pub fn clear(&mut self) {
        for slot in &self.slots {
            self.generation_floor = self
                .generation_floor
                .max(slot.generation.wrapping_add(1));
        }
        self.slots.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_reuse() {
        let mut arena = ObjectArena::<Vec<i32>>::new(4);

        let (h1, v1) = arena.acquire();
        v1.push(42);
        assert_eq!(arena.live_count(), 1);

        assert!(arena.release(h1));
        assert_eq!(arena.available_count(), 1);

        // 复用同一槽位，内容保留
        let (h2, v2) = arena.acquire();
        assert_eq!(v2.as_slice(), &[42]);
        assert_eq!(h1.index(), h2.index());
        assert_eq!(arena.stats().reuses, 1);
        assert_eq!(arena.stats().allocations, 1);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut arena = ObjectArena::<u32>::new(2);
        let (h1, _) = arena.acquire();
        arena.release(h1);
        let (h2, _) = arena.acquire();

        assert!(arena.get(h1).is_none());
        assert!(!arena.release(h1));
        assert!(arena.get(h2).is_some());
    }

    #[test]
    fn test_overflow_is_dropped_not_retained() {
        let mut arena = ObjectArena::<u32>::new(2);
        let handles: Vec<_> = (0..5).map(|_| arena.acquire().0).collect();
        assert_eq!(arena.live_count(), 5);

        for h in handles {
            assert!(arena.release(h));
        }

        assert_eq!(arena.available_count(), 2);
        assert_eq!(arena.stats().drops, 3);
        assert_eq!(arena.slots.len(), 2);
    }

    #[test]
    fn test_dropped_slot_handles_stay_invalid() {
        let mut arena = ObjectArena::<u32>::new(1);
        let (a, _) = arena.acquire();
        let (b, _) = arena.acquire();
        arena.release(a);
        arena.release(b);

        // 索引 1 被丢弃后重新分配
        arena.acquire();
        let (c, _) = arena.acquire();
        assert_eq!(c.index(), b.index());
        assert!(arena.get(b).is_none());
        assert!(arena.get(c).is_some());

        arena.clear();
        let (d, _) = arena.acquire();
        assert_eq!(d.index(), 0);
        assert!(arena.get(a).is_none());
    }
}
