//! Family tree record keeping: flat person collections with
//! relationship queries, a centered generational layout, SVG
//! rendering, and a JSON-file-per-tree store with a web API on top.

pub mod audit;
pub mod layout;
pub mod person;
pub mod query;
pub mod render;
#[cfg(feature = "server")]
pub mod serve;
pub mod store;
pub mod tree;
pub mod utils;

pub use serde::{Deserialize, Serialize};

pub use audit::{Issue, IssueKind, audit};
pub use layout::{LayoutConfig, Link, PlacedNode, Point, TreeLayout};
pub use person::{Gender, Person, SpouseLink, parse_person_date};
pub use query::{
    AnniversaryEntry, BirthdayEntry, SiblingPolicy, ancestors, calculate_age, calculate_age_on,
    children, descendants, parents, person_by_id, siblings, siblings_with_policy, spouses,
    upcoming_anniversaries, upcoming_anniversaries_in, upcoming_birthdays, upcoming_birthdays_in,
};
pub use render::{DEFAULT_BACKGROUND, render_svg};
pub use store::{
    DEFAULT_TREE_ID, NewTree, StoreError, TreePatch, TreeStore, TreeSummary, parse_tree,
};
pub use tree::{FamilyTree, PersonUpdate, SpouseDates};
pub use utils::{escape_xml, now_iso};
