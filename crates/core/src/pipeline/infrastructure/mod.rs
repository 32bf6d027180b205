pub mod channel_event_sink;
pub mod collecting_sink;
pub mod fanout_sink;
pub mod json_lines_event_sink;
pub mod log_event_sink;
pub mod threaded_pipeline_executor;
