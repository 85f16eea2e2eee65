pub mod connection;
pub mod maintenance_queries;
pub mod reading_queries;
pub mod schema;

pub use connection::{close, connect, connect_or_create, health_check, quote_identifier, ConnectionSettings};
pub use maintenance_queries::{
    insert_maintenance_event, last_maintenance, last_maintenance_of_type, recent_maintenance,
};
pub use reading_queries::{insert_reading, recent_readings};
pub use schema::ensure_schema;
