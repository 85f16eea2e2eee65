pub mod timescale;

pub use timescale::TimescaleSink;
