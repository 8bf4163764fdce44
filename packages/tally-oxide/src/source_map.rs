use std::collections::HashMap;

/// Position in the source a generated line came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    pub line: u32,
}

/// Bridge to a position-mapping service used to enrich reports.
/// `None` means the position maps to itself.
pub trait PositionMapper {
    fn original_position(&self, file: &str, line: u32) -> Option<OriginalPosition>;
}

impl<F> PositionMapper for F
where
    F: Fn(&str, u32) -> Option<OriginalPosition>,
{
    fn original_position(&self, file: &str, line: u32) -> Option<OriginalPosition> {
        self(file, line)
    }
}

/// Fixed line table, for hosts that resolve mappings ahead of analysis.
#[derive(Clone, Debug, Default)]
pub struct StaticPositionMap {
    inner: HashMap<(String, u32), OriginalPosition>,
}

impl StaticPositionMap {
    pub fn new() -> StaticPositionMap {
        Default::default()
    }

    pub fn insert(&mut self, file: &str, line: u32, original: OriginalPosition) {
        self.inner.insert((file.to_string(), line), original);
    }
}

impl PositionMapper for StaticPositionMap {
    fn original_position(&self, file: &str, line: u32) -> Option<OriginalPosition> {
        self.inner.get(&(file.to_string(), line)).cloned()
    }
}
