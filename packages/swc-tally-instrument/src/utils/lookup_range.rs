use swc_core::common::{SourceMap, Span};
use tally_oxide::Range;

pub fn get_range_from_span(source_map: &SourceMap, span: &Span) -> Range {
    // Generated nodes carry no position and cannot be located.
    if span.hi.is_dummy() || span.lo.is_dummy() {
        return Default::default();
    }

    let span_hi_loc = source_map.lookup_char_pos(span.hi);
    let span_lo_loc = source_map.lookup_char_pos(span.lo);

    Range::new(
        span_lo_loc.line as u32,
        span_lo_loc.col.0 as u32,
        span_hi_loc.line as u32,
        span_hi_loc.col.0 as u32,
    )
}
