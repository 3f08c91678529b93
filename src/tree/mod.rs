//! Crawl tree model and post-crawl restructuring
//!
//! The crawler grows a [`CrawlArena`]; once the frontier drains the arena is
//! turned into an owned [`CrawlNode`] tree, normalized in place by the passes in
//! [`restructure`](restructure::restructure), and finally converted into a
//! [`CanonicalNode`] tree for packaging.

mod arena;
mod canonical;
mod node;
mod restructure;

pub use arena::{CrawlArena, NodeId};
pub use canonical::{to_canonical, CanonicalNode};
pub use node::{CanonicalKind, CrawlNode, NodeKind, PageKind, PreOrder};
pub use restructure::{
    classify_media, derive_source_id, normalize_tree, remove_backlinks, remove_sections,
    restructure, RestructureReport, UnknownNode,
};
