//! Coverage data shared by the instrumenter and the host: the runtime [`Registry`],
//! include / exclude [`PathFilter`]s and the [`Analyzer`] producing line reports.
mod analyzer;
mod path_filter;
mod percent;
mod range;
mod registry;
mod report;
mod source_map;
mod truthy;

pub use analyzer::*;
pub use path_filter::*;
pub use percent::*;
pub use range::*;
pub use registry::*;
pub use report::*;
pub use source_map::*;
pub use truthy::*;
