/// Percentage of `covered` over `total`, 0 when there is nothing to cover.
pub fn percent(covered: u32, total: u32) -> f64 {
    if total > 0 {
        covered as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}
