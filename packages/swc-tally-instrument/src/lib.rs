//! Statement and branch coverage instrumentation for JavaScript sources, built on SWC.
mod coverage_template;
mod error;
mod instrument;
mod options;
mod session;
mod transform;
pub mod utils;
mod visitors;

pub use coverage_template::*;
pub use error::*;
pub use instrument::*;
pub use options::*;
pub use session::*;
pub use transform::*;
pub use visitors::*;

// Reexports
pub use tally_oxide::{
    AggregateReport, AnalyzeConfig, CoverageReport, PatternError, PositionMapper, Registry,
    RegistrySnapshot, Truthy,
};
