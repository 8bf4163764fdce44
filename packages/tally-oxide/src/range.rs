use serde::{Deserialize, Serialize};

/// 1-based line, 0-based character column.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Location {
        Location { line, column }
    }
}

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Location,
    pub end: Location,
}

impl Range {
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Range {
        Range {
            start: Location::new(start_line, start_column),
            end: Location::new(end_line, end_column),
        }
    }

    pub fn is_single_line(&self) -> bool {
        self.start.line == self.end.line
    }
}
