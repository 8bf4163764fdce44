mod instrument_options;

pub use instrument_options::*;
