pub mod entry;
pub mod feeder_reading;

pub use entry::{display_date, iso_date, Entry, DEFAULT_CIRCLE, DEFAULT_DIVISION};
pub use feeder_reading::{feeder_key_ordinal, FeederReading, Measurement};
