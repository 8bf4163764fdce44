pub mod edit_buffer;
pub mod hint_comments;
pub mod lookup_range;
