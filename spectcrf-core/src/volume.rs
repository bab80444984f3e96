//! Volume hierarchy used to validate the actor's placement.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Name of the hierarchy root.
pub const WORLD: &str = "world";

/// A named logical volume.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Volume {
    pub name: String,
    /// Mother volume; `None` only for the world.
    pub mother: Option<String>,
    /// Number of placed copies; more than one makes it a repeated volume.
    pub copies: u32,
}

/// Mother/daughter relations of the geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeTree {
    volumes: HashMap<String, Volume>,
}

impl Default for VolumeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeTree {
    /// Creates a hierarchy containing only the world.
    #[must_use]
    pub fn new() -> Self {
        let mut volumes = HashMap::new();
        volumes.insert(
            WORLD.to_string(),
            Volume {
                name: WORLD.to_string(),
                mother: None,
                copies: 1,
            },
        );
        Self { volumes }
    }

    /// Inserts (or replaces) a single-copy volume.
    pub fn insert(&mut self, name: &str, mother: &str) -> &mut Self {
        self.insert_repeated(name, mother, 1)
    }

    /// Inserts (or replaces) a volume placed `copies` times.
    ///
    /// The world is the fixed root and is never replaced.
    pub fn insert_repeated(&mut self, name: &str, mother: &str, copies: u32) -> &mut Self {
        if name == WORLD {
            log::warn!("ignoring redefinition of {WORLD} inside {mother}");
            return self;
        }
        self.volumes.insert(
            name.to_string(),
            Volume {
                name: name.to_string(),
                mother: Some(mother.to_string()),
                copies,
            },
        );
        self
    }

    /// Builder form of [`Self::insert`].
    #[must_use]
    pub fn with(mut self, name: &str, mother: &str) -> Self {
        self.insert(name, mother);
        self
    }

    /// Resolves a volume by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Volume> {
        self.volumes.get(name)
    }

    /// Number of volumes, world included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// Always false: the world is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Walks from `name` (inclusive) towards the world (inclusive).
    ///
    /// Stops early at an unknown mother, and never loops on a cyclic hierarchy.
    pub fn ancestors<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Volume> + 'a {
        let mut next = self.find(name);
        let mut remaining = self.volumes.len();
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            let current = next?;
            next = current.mother.as_deref().and_then(|m| self.find(m));
            Some(current)
        })
    }
}
