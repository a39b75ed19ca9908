//! Request matching: prefix stripping, path matching, condition evaluation.

mod condition;
mod path;
mod prefix;

pub use condition::evaluate_condition;
pub use path::find_matching_rule;
pub use prefix::strip_prefix;
