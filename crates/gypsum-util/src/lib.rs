pub mod fifo_heap;
pub mod index_map;
pub mod path;
pub mod shell;
pub mod split;
