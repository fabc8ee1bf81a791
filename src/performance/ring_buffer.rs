/// 固定容量环形缓冲区
///
/// 用于帧率历史、帧指标等滚动数据，push 为 O(1)
use std::collections::VecDeque;

/// 固定容量的环形缓冲区
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// 创建指定容量的环形缓冲区
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 添加元素，如果已满则移除最旧的元素
    pub fn push(&mut self, value: T) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    /// 获取迭代器（从旧到新）
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.buffer.iter()
    }

    /// 最近的 `n` 个元素（从旧到新）
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.buffer.len().saturating_sub(n);
        self.buffer.iter().skip(skip)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// 获取最新的元素
    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }

    /// 获取最旧的元素
    pub fn first(&self) -> Option<&T> {
        self.buffer.front()
    }
}

impl<T> RingBuffer<T>
where
    T: Copy + Into<f64>,
{
    /// 计算平均值，空缓冲区返回 0
    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.buffer.iter().map(|&x| x.into()).sum();
        sum / self.buffer.len() as f64
    }

    /// 最近 `n` 个样本的 (均值, 总体标准差)；样本不足 `n` 个时返回 `None`
    pub fn recent_mean_std_dev(&self, n: usize) -> Option<(f64, f64)> {
        if n == 0 || self.buffer.len() < n {
            return None;
        }
        let mean = self.recent(n).map(|&x| x.into()).sum::<f64>() / n as f64;
        let variance = self
            .recent(n)
            .map(|&x| {
                let d = x.into() - mean;
                d * d
            })
            .sum::<f64>()
            / n as f64;
        Some((mean, variance.sqrt()))
    }

    /// 计算最小值
    pub fn min(&self) -> Option<f64> {
        self.buffer.iter().map(|&x| x.into()).reduce(f64::min)
    }

    /// 计算最大值
    pub fn max(&self) -> Option<f64> {
        self.buffer.iter().map(|&x| x.into()).reduce(f64::max)
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_basic() {
        let mut buffer = RingBuffer::new(3);

        buffer.push(1.0f32);
        buffer.push(2.0);
        buffer.push(3.0);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.average(), 2.0);

        // 添加第4个元素，应该移除第1个
        buffer.push(4.0);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.first(), Some(&2.0));
        assert_eq!(buffer.last(), Some(&4.0));
        assert_eq!(buffer.average(), 3.0);
    }

    #[test]
    fn test_ring_buffer_stats() {
        let mut buffer = RingBuffer::new(5);

        for v in [10.0f32, 20.0, 30.0, 40.0, 50.0] {
            buffer.push(v);
        }

        assert_eq!(buffer.average(), 30.0);
        assert_eq!(buffer.min(), Some(10.0));
        assert_eq!(buffer.max(), Some(50.0));
    }

    #[test]
    fn test_recent_window_std_dev() {
        let mut buffer = RingBuffer::new(10);
        buffer.push(100.0f32);
        for _ in 0..4 {
            buffer.push(60.0);
        }

        assert_eq!(buffer.recent_mean_std_dev(6), None);
        let (mean, std_dev) = buffer.recent_mean_std_dev(4).unwrap();
        assert_eq!(mean, 60.0);
        assert_eq!(std_dev, 0.0);

        let (mean, std_dev) = buffer.recent_mean_std_dev(2).unwrap();
        assert_eq!(mean, 60.0);
        assert_eq!(std_dev, 0.0);

        let (mean, std_dev) = buffer.recent_mean_std_dev(5).unwrap();
        assert_eq!(mean, 68.0);
        assert!((std_dev - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_ring_buffer_empty() {
        let buffer: RingBuffer<f32> = RingBuffer::new(10);

        assert!(buffer.is_empty());
        assert_eq!(buffer.average(), 0.0);
        assert_eq!(buffer.min(), None);
        assert_eq!(buffer.max(), None);
    }
}
