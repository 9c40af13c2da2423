//! Comparison helpers shared by every kind: tag, label and CIDR diffs, late-initialization and
//! the order-insensitive equivalence used by the up-to-date checks.
pub mod cidr;
pub mod labels;
pub mod lateinit;
pub mod tags;

pub use self::cidr::{canonicalize_cidrs, cidrs_equal};
pub use self::labels::diff_labels;
pub use self::lateinit::{equivalent, LateInitializer};
pub use self::tags::diff_tags;
