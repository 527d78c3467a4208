pub mod live_view_error;
pub mod live_view_use_case;
pub mod pipeline_logger;
