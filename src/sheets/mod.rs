pub mod credentials;
pub mod row_sink;
pub mod sheets_error;

pub use credentials::TokenSource;
pub use row_sink::{RetryPolicy, RowSink, SheetsSink, DEFAULT_SHEETS_API_URL};
pub use sheets_error::SinkError;
