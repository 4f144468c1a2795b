//! Spatial hash grid for proximity queries
//!
//! Divides the world into uniform square cells. An entity lives in the
//! cell containing its center; a reverse map from entity to cell makes
//! remove/move O(cell population). Entities wider than a cell go into a
//! short oversized list instead, so overlap queries only ever need one
//! extra ring of cells around the query circle.

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use std::fmt;

use crate::game::state::{unknown_entity, HoleId, ObjectId};
use crate::util::vec2::Vec2;

/// Initial capacity for the cell map (number of expected non-empty cells)
const INITIAL_CELL_CAPACITY: usize = 512;

/// Initial capacity for entity vectors within cells
const CELL_INITIAL_CAPACITY: usize = 8;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// What an index entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Hole(HoleId),
    Object(ObjectId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Hole(id) => write!(f, "{}", id),
            EntityRef::Object(id) => write!(f, "{}", id),
        }
    }
}

/// Entity data stored in the grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    pub id: EntityRef,
    pub position: Vec2,
    pub radius: f32,
}

/// Query results; most queries return a handful of entries
pub type QueryResult = SmallVec<[SpatialEntry; 16]>;

/// Where an entity is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Cell(CellKey),
    /// Radius larger than a cell
    Oversized,
}

/// Uniform grid over holes and world objects
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    cells: HashMap<CellKey, Vec<SpatialEntry>, FxBuildHasher>,
    /// Entities whose radius exceeds the cell size, in insertion order
    oversized: Vec<SpatialEntry>,
    /// Where each registered entity currently lives
    locations: HashMap<EntityRef, Slot, FxBuildHasher>,
}

impl SpatialIndex {
    /// Create an index with the given cell size
    ///
    /// A cell size around the typical query radius keeps queries to a
    /// 3x3 block of cells; larger queries simply visit more cells.
    pub fn new(cell_size: f32) -> Self {
        debug_assert!(cell_size > 0.0, "cell size must be positive");
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity_and_hasher(INITIAL_CELL_CAPACITY, FxBuildHasher),
            oversized: Vec::new(),
            locations: HashMap::with_hasher(FxBuildHasher),
        }
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Convert world position to cell key
    #[inline]
    pub fn cell_of(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    fn slot_for(&self, position: Vec2, radius: f32) -> Slot {
        if radius > self.cell_size {
            Slot::Oversized
        } else {
            Slot::Cell(self.cell_of(position))
        }
    }

    fn push_entry(&mut self, slot: Slot, entry: SpatialEntry) {
        match slot {
            Slot::Cell(key) => self
                .cells
                .entry(key)
                .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
                .push(entry),
            Slot::Oversized => self.oversized.push(entry),
        }
    }

    fn take_entry(&mut self, slot: Slot, id: EntityRef) -> bool {
        match slot {
            Slot::Cell(key) => match self.cells.get_mut(&key) {
                Some(cell) => match cell.iter().position(|e| e.id == id) {
                    Some(pos) => {
                        cell.swap_remove(pos);
                        true
                    }
                    None => false,
                },
                None => false,
            },
            Slot::Oversized => match self.oversized.iter().position(|e| e.id == id) {
                Some(pos) => {
                    self.oversized.remove(pos);
                    true
                }
                None => false,
            },
        }
    }

    fn entry_mut(&mut self, slot: Slot, id: EntityRef) -> Option<&mut SpatialEntry> {
        match slot {
            Slot::Cell(key) => self.cells.get_mut(&key)?.iter_mut().find(|e| e.id == id),
            Slot::Oversized => self.oversized.iter_mut().find(|e| e.id == id),
        }
    }

    /// Register an entity. Registering an id twice moves it instead.
    pub fn insert(&mut self, id: EntityRef, position: Vec2, radius: f32) {
        if self.locations.contains_key(&id) {
            debug_assert!(false, "{} is already in the spatial index", id);
            self.move_to(id, position, radius);
            return;
        }
        let slot = self.slot_for(position, radius);
        self.push_entry(slot, SpatialEntry { id, position, radius });
        self.locations.insert(id, slot);
    }

    /// Unregister an entity. Removing an unknown id is a caller error.
    pub fn remove(&mut self, id: EntityRef) -> bool {
        let Some(slot) = self.locations.remove(&id) else {
            unknown_entity("spatial entry", id);
            return false;
        };
        self.take_entry(slot, id)
    }

    /// Update an entity's position (and radius), changing slots when needed
    pub fn move_to(&mut self, id: EntityRef, position: Vec2, radius: f32) {
        let Some(old_slot) = self.locations.get(&id).copied() else {
            unknown_entity("spatial entry", id);
            return;
        };
        let new_slot = self.slot_for(position, radius);

        if old_slot == new_slot {
            if let Some(entry) = self.entry_mut(old_slot, id) {
                entry.position = position;
                entry.radius = radius;
            }
            return;
        }

        self.take_entry(old_slot, id);
        self.push_entry(new_slot, SpatialEntry { id, position, radius });
        self.locations.insert(id, new_slot);
    }

    pub fn contains(&self, id: EntityRef) -> bool {
        self.locations.contains_key(&id)
    }

    /// Visit every entry whose center lies within `radius` of `center`
    ///
    /// Cells are visited row by row, so the visit order only depends on
    /// the sequence of index operations, never on hashing.
    pub fn for_each_within<F>(&self, center: Vec2, radius: f32, mut visit: F)
    where
        F: FnMut(&SpatialEntry),
    {
        let radius = radius.max(0.0);
        let radius_sq = radius * radius;
        let (min_x, min_y) = self.cell_of(center - Vec2::new(radius, radius));
        let (max_x, max_y) = self.cell_of(center + Vec2::new(radius, radius));

        for cy in min_y..=max_y {
            for cx in min_x..=max_x {
                let Some(cell) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for entry in cell {
                    if entry.position.distance_sq_to(center) <= radius_sq {
                        visit(entry);
                    }
                }
            }
        }
        for entry in &self.oversized {
            if entry.position.distance_sq_to(center) <= radius_sq {
                visit(entry);
            }
        }
    }

    /// Visit every entry whose circle overlaps the circle at `center`
    ///
    /// Touching counts: `distance <= radius + entry.radius`. Cell entries
    /// are never wider than a cell, so one extra ring of cells is enough
    /// regardless of how large the biggest entity in the world is.
    pub fn for_each_overlapping<F>(&self, center: Vec2, radius: f32, mut visit: F)
    where
        F: FnMut(&SpatialEntry),
    {
        let radius = radius.max(0.0);
        let reach = radius + self.cell_size;
        let (min_x, min_y) = self.cell_of(center - Vec2::new(reach, reach));
        let (max_x, max_y) = self.cell_of(center + Vec2::new(reach, reach));

        let overlaps = |entry: &SpatialEntry| {
            let limit = radius + entry.radius;
            entry.position.distance_sq_to(center) <= limit * limit
        };

        for cy in min_y..=max_y {
            for cx in min_x..=max_x {
                let Some(cell) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for entry in cell.iter().filter(|&e| overlaps(e)) {
                    visit(entry);
                }
            }
        }
        for entry in self.oversized.iter().filter(|&e| overlaps(e)) {
            visit(entry);
        }
    }

    /// All entries within `radius` of `center`
    pub fn query(&self, center: Vec2, radius: f32) -> QueryResult {
        let mut out = QueryResult::new();
        self.for_each_within(center, radius, |e| out.push(*e));
        out
    }

    /// Holes within `radius` of `center`
    pub fn query_holes(&self, center: Vec2, radius: f32) -> QueryResult {
        let mut out = QueryResult::new();
        self.for_each_within(center, radius, |e| {
            if matches!(e.id, EntityRef::Hole(_)) {
                out.push(*e);
            }
        });
        out
    }

    /// World objects within `radius` of `center`
    pub fn query_objects(&self, center: Vec2, radius: f32) -> QueryResult {
        let mut out = QueryResult::new();
        self.for_each_within(center, radius, |e| {
            if matches!(e.id, EntityRef::Object(_)) {
                out.push(*e);
            }
        });
        out
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        self.oversized.clear();
        self.locations.clear();
    }

    /// Get grid statistics for monitoring
    pub fn stats(&self) -> SpatialIndexStats {
        let occupied: Vec<usize> = self
            .cells
            .values()
            .map(Vec::len)
            .filter(|&n| n > 0)
            .collect();
        let in_cells: usize = occupied.iter().sum();
        SpatialIndexStats {
            occupied_cells: occupied.len(),
            entity_count: in_cells + self.oversized.len(),
            oversized: self.oversized.len(),
            max_per_cell: occupied.iter().copied().max().unwrap_or(0),
            avg_per_cell: if occupied.is_empty() {
                0.0
            } else {
                in_cells as f32 / occupied.len() as f32
            },
        }
    }
}

/// Statistics about grid usage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialIndexStats {
    pub occupied_cells: usize,
    pub entity_count: usize,
    /// Entities kept outside the grid because they are wider than a cell
    pub oversized: usize,
    pub max_per_cell: usize,
    pub avg_per_cell: f32,
}
