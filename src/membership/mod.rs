//! Email normalization and the membership set value type.

mod email;
mod set;

pub use email::{canonicalize_gmail, is_valid_email, normalize_email};
pub use set::MembershipSet;
