//! One typed record per kind of source feature. Attributes the cadastre may leave out are
//! explicit `Option`s.

use geom::{Polygon, Pt2D};

/// A postal address. Most describe a whole building, some just one of its entrances.
#[derive(Clone, Debug, PartialEq)]
pub struct Address {
    pub local_id: String,
    pub pt: Pt2D,
    /// "Entrance", "Parcel", ...
    pub specification: Option<String>,
    /// The house number
    pub designator: String,
    /// The thoroughfare name, filled in from the joined table and later corrected
    pub thoroughfare: Option<String>,
    pub post_code: Option<String>,
    pub image: Option<String>,
    /// Foreign key into the postal descriptors
    pub pd_id: Option<String>,
    /// Foreign key into the thoroughfare names
    pub tn_id: Option<String>,
    pub task: Option<String>,
}

impl Address {
    /// The building this address belongs to, matching `Construction::building_id`.
    pub fn reference(&self) -> &str {
        self.local_id.rsplit('.').next().unwrap_or(&self.local_id)
    }

    pub fn is_entrance(&self) -> bool {
        self.specification.as_deref() == Some("Entrance")
    }
}

/// A building, a part of one, or another construction like a swimming pool. They share one
/// layer; the shape of `local_id` tells them apart.
#[derive(Clone, Debug, PartialEq)]
pub struct Construction {
    pub local_id: String,
    pub polygon: Polygon,
    /// "functional", "declined", "ruin"
    pub condition: Option<String>,
    /// "1_residential", "2_agriculture", ...
    pub current_use: Option<String>,
    /// "openAirPool" for pools
    pub nature: Option<String>,
    pub lev_above: Option<i64>,
    pub lev_below: Option<i64>,
    pub layer: Option<i64>,
    pub fixme: Option<String>,
    pub task: Option<String>,
}

impl Construction {
    pub fn is_building(&self) -> bool {
        is_building(&self.local_id)
    }

    pub fn is_part(&self) -> bool {
        is_part(&self.local_id)
    }

    pub fn building_id(&self) -> &str {
        building_id(&self.local_id)
    }
}

/// A whole building's ID has no suffix.
pub fn is_building(local_id: &str) -> bool {
    !local_id.contains('_')
}

pub fn is_part(local_id: &str) -> bool {
    local_id.contains("_part")
}

/// Parts and other constructions extend their building's ID with a `_` suffix.
pub fn building_id(local_id: &str) -> &str {
    local_id.split('_').next().unwrap_or(local_id)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parcel {
    pub local_id: String,
    pub polygon: Polygon,
    pub label: Option<String>,
    /// How many building parts lie inside
    pub parts: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneKind {
    /// A city block
    Urban,
    /// A rural area
    Rustic,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Zoning {
    pub local_id: String,
    pub polygon: Polygon,
    pub kind: ZoneKind,
    pub label: Option<String>,
}

impl Zoning {
    pub fn level_name(&self) -> &'static str {
        match self.kind {
            ZoneKind::Urban => "M",
            ZoneKind::Rustic => "P",
        }
    }
}
