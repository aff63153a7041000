//! An in-memory OSM element graph, plus reading and writing it as OSM XML and fetching it from
//! Overpass.
//!
//! Elements live in an arena keyed by opaque handles. Ways hold `NodeID`s and relations hold
//! `OsmID`s rather than references, so merging and deduplicating never has to untangle a graph
//! of owning pointers. Handles are positional and local to one `OsmData`; real (negative
//! placeholder) IDs are only assigned when writing.

#[macro_use]
extern crate log;

mod data;
pub mod overpass;
mod reader;
mod writer;

use std::fmt;

use abstutil::Tags;
use geom::Pt2D;

pub use crate::data::OsmData;
pub use crate::reader::{read, read_file};
pub use crate::writer::{to_xml, write_file};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeID(pub usize);
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WayID(pub usize);
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationID(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OsmID {
    Node(NodeID),
    Way(WayID),
    Relation(RelationID),
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "node #{}", self.0)
    }
}

impl fmt::Display for WayID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "way #{}", self.0)
    }
}

impl fmt::Display for RelationID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "relation #{}", self.0)
    }
}

impl fmt::Display for OsmID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OsmID::Node(n) => write!(f, "{}", n),
            OsmID::Way(w) => write!(f, "{}", w),
            OsmID::Relation(r) => write!(f, "{}", r),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub pt: Pt2D,
    pub tags: Tags,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Way {
    pub nodes: Vec<NodeID>,
    pub tags: Tags,
}

impl Way {
    pub fn is_closed(&self) -> bool {
        self.nodes.len() > 1 && self.nodes[0] == self.nodes[self.nodes.len() - 1]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Member {
    pub id: OsmID,
    pub role: String,
}

impl Member {
    pub fn new<I: Into<String>>(id: OsmID, role: I) -> Member {
        Member {
            id,
            role: role.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    pub members: Vec<Member>,
    pub tags: Tags,
}
