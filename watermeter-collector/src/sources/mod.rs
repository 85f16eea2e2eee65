pub mod meter_http;

pub use meter_http::HttpMeterSource;
