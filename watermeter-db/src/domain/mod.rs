pub mod maintenance_event;
pub mod reading;

pub use maintenance_event::{days_since, MaintenanceEvent, NewMaintenanceEvent, SALT_REPLACEMENT};
pub use reading::Reading;
