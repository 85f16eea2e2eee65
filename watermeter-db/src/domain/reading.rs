use time::OffsetDateTime;

/// One validated observation from the meter, keyed by `(time, meter_id)`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    pub time: OffsetDateTime,
    pub meter_id: String,
    pub total_liter_m3: f64,
    pub active_liter_lpm: f64,
    pub wifi_strength: i32,
    pub wifi_ssid: Option<String>,
    pub total_liter_offset_m3: Option<f64>,
}
