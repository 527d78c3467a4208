pub mod frame_source;
pub mod stream_resolver;
