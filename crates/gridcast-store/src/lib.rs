pub mod error;
pub mod schema;
pub mod sink;

pub use error::StoreError;
pub use schema::RecordTable;
pub use sink::SqliteSink;
