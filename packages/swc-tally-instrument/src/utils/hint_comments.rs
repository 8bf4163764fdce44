use once_cell::sync::Lazy;
use regex::Regex as Regexp;
use swc_core::common::{comments::Comment, BytePos};

/// pattern toggling instrumentation off / on for a region of the file
static COMMENT_BYPASS_RE: Lazy<Regexp> =
    Lazy::new(|| Regexp::new(r"^\s*\$tally:coverage:(off|on)\$\s*$").unwrap());

/// Half-open byte ranges of the source excluded from instrumentation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BypassRanges(Vec<(usize, usize)>);

impl BypassRanges {
    /// Collect ranges enclosed by `$tally:coverage:off$` / `$tally:coverage:on$` comment pairs.
    /// Comments must be sorted by position; offsets are relative to `start_pos`.
    pub fn from_comments(comments: &[Comment], start_pos: BytePos, source_len: usize) -> Self {
        let offset = |pos: BytePos| pos.0.saturating_sub(start_pos.0) as usize;

        let mut ranges = vec![];
        let mut skip_start = None;
        for comment in comments {
            let Some(toggle) = COMMENT_BYPASS_RE
                .captures(&comment.text)
                .and_then(|c| c.get(1))
            else {
                continue;
            };

            match (toggle.as_str(), skip_start) {
                ("off", None) => skip_start = Some(offset(comment.span.hi)),
                ("on", Some(start)) => {
                    ranges.push((start, offset(comment.span.lo)));
                    skip_start = None;
                }
                // repeated directives do not change state
                _ => {}
            }
        }

        if let Some(start) = skip_start {
            ranges.push((start, source_len));
        }

        BypassRanges(ranges)
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.0
            .iter()
            .any(|(start, end)| *start <= offset && offset < *end)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ranges(&self) -> &[(usize, usize)] {
        &self.0
    }
}
