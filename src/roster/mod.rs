//! Desired membership derived from OSM section rosters.
//!
//! Members are classified into adult leaders, young leaders and everyone
//! else. Each class feeds one of the section's mailing groups.

mod file;
mod group_type;
mod member;
mod section;

pub use file::{Roster, RosterFile};
pub use group_type::GroupType;
pub use member::{Contact, Member, ADULT_AGE};
pub use section::Section;

use crate::membership::MembershipSet;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Roster not found at {0}")]
    RosterNotFound(String),

    #[error("Section {0} not found in roster")]
    SectionNotFound(String),

    #[error("Membership source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the desired email set for a section's group
#[async_trait]
pub trait MembershipSource: Send + Sync {
    async fn desired_members(
        &self,
        section_id: &str,
        group_type: GroupType,
    ) -> Result<MembershipSet, SourceError>;
}
