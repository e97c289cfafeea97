//! Production and research queues.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::universe::ObjectId;

/// What a production queue entry builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionKind {
    Ship { design: String },
    Building { building_type: String },
}

impl ProductionKind {
    pub fn name(&self) -> &str {
        match self {
            ProductionKind::Ship { design } => design,
            ProductionKind::Building { building_type } => building_type,
        }
    }
}

impl fmt::Display for ProductionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductionKind::Ship { design } => write!(f, "ship {}", design),
            ProductionKind::Building { building_type } => write!(f, "building {}", building_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionItem {
    pub kind: ProductionKind,
    /// Planet the item is built at.
    pub location: ObjectId,
    /// Units still to build, including the one in progress.
    pub remaining: u32,
    /// Industry spent on the unit in progress.
    pub progress: f32,
    /// Industry allocated this turn.
    pub allocated: f32,
    pub turns_in_progress: u32,
}

impl ProductionItem {
    pub fn new(kind: ProductionKind, location: ObjectId, quantity: u32) -> Self {
        ProductionItem {
            kind,
            location,
            remaining: quantity.max(1),
            progress: 0.0,
            allocated: 0.0,
            turns_in_progress: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductionQueue {
    pub items: Vec<ProductionItem>,
}

impl ProductionQueue {
    pub fn push(&mut self, item: ProductionItem) {
        self.items.push(item);
    }

    pub fn remove(&mut self, index: usize) -> Option<ProductionItem> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether an item of `kind` is already queued at `location`.
    pub fn contains(&self, kind: &ProductionKind, location: ObjectId) -> bool {
        self.items.iter().any(|i| &i.kind == kind && i.location == location)
    }

    /// Removes and returns every item located at `location`.
    pub fn take_items_at(&mut self, location: ObjectId) -> Vec<ProductionItem> {
        let (taken, kept): (Vec<_>, Vec<_>) =
            self.items.drain(..).partition(|i| i.location == location);
        self.items = kept;
        taken
    }

    pub fn total_allocated(&self) -> f32 {
        self.items.iter().map(|i| i.allocated).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResearchQueue {
    pub techs: Vec<String>,
    /// Research points spent per tech, kept across dequeue/enqueue.
    pub progress: BTreeMap<String, f32>,
}

impl ResearchQueue {
    pub fn contains(&self, tech: &str) -> bool {
        self.techs.iter().any(|t| t == tech)
    }

    /// Inserts `tech` at `position`, or at the end.
    pub fn insert(&mut self, tech: String, position: Option<usize>) {
        match position {
            Some(pos) if pos < self.techs.len() => self.techs.insert(pos, tech),
            _ => self.techs.push(tech),
        }
    }

    pub fn remove(&mut self, tech: &str) -> bool {
        let before = self.techs.len();
        self.techs.retain(|t| t != tech);
        self.techs.len() != before
    }

    pub fn progress(&self, tech: &str) -> f32 {
        self.progress.get(tech).copied().unwrap_or(0.0)
    }
}
