pub mod csv;
pub mod json;

pub use self::csv::{write_trace, write_trace_file};
pub use self::json::{write_summary, write_summary_file};
