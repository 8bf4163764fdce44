mod coverage_visitor;

pub use coverage_visitor::*;
