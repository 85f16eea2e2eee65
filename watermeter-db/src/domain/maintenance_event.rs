use time::{Duration, OffsetDateTime};

pub const SALT_REPLACEMENT: &str = "salt_replacement";

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaintenanceEvent {
    pub id: i32,
    pub time: OffsetDateTime,
    pub meter_id: String,
    pub maintenance_type: String,
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub cost: Option<f64>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// A maintenance event before the database assigns its `id`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewMaintenanceEvent {
    pub meter_id: String,
    pub maintenance_type: String,
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub cost: Option<f64>,
    pub notes: Option<String>,
    pub created_by: String,
}

/// Whole days elapsed between `time` and `now`, rounded towards negative infinity.
pub fn days_since(time: OffsetDateTime, now: OffsetDateTime) -> i64 {
    let elapsed = now - time;
    let days = elapsed.whole_days();
    if elapsed < Duration::days(days) {
        days - 1
    } else {
        days
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn days_since_counts_whole_days() {
        let now = datetime!(2025-11-15 12:00:00 UTC);
        assert_eq!(days_since(datetime!(2025-11-15 00:00:00 UTC), now), 0);
        assert_eq!(days_since(datetime!(2025-11-14 12:00:00 UTC), now), 1);
        assert_eq!(days_since(datetime!(2025-11-14 12:00:01 UTC), now), 0);
        assert_eq!(days_since(datetime!(2025-10-16 11:59:59 UTC), now), 30);
    }

    #[test]
    fn days_since_floors_future_times() {
        let now = datetime!(2025-11-15 12:00:00 UTC);
        assert_eq!(days_since(datetime!(2025-11-15 18:00:00 UTC), now), -1);
    }

    #[test]
    fn days_since_respects_offsets() {
        let now = datetime!(2025-11-15 12:00:00 UTC);
        assert_eq!(days_since(datetime!(2025-11-14 13:00:00 +01:00), now), 1);
    }
}
