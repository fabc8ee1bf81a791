pub mod arena;
pub mod ring_buffer;

pub use arena::{ArenaHandle, ArenaStats, ObjectArena};
pub use ring_buffer::RingBuffer;
