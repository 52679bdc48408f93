pub mod chunks;
pub mod compositor;
pub mod frame_control;
pub mod header;
pub mod loader;
pub mod reconstruct;
