//! A router: a bag of owned, named interfaces plus identity and optional location.

use crate::coordinate::Coordinate;
use crate::topology::{InterfaceId, RouterId};

/// A router in the network.
///
/// A router owns its interfaces; the first-added alias is never removed, and the *last*-added
/// alias is the primary name.
#[derive(Debug, Clone)]
pub struct Router {
    index: RouterId,
    aliases: Vec<String>,
    interfaces: Vec<(String, InterfaceId)>,
    coordinate: Option<Coordinate>,
    is_null: bool,
}

impl Router {
    pub(crate) fn new(index: RouterId, name: String, is_null: bool) -> Self {
        Self { index, aliases: vec![name], interfaces: Vec::new(), coordinate: None, is_null }
    }

    /// This router's index in the network graph.
    pub fn index(&self) -> RouterId {
        self.index
    }

    /// The primary name: the most recently added alias.
    pub fn name(&self) -> &str {
        self.aliases.last().expect("a router always has at least one alias")
    }

    /// All aliases this router is known by, oldest first.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Add a new alias, which becomes the primary name.
    pub(crate) fn add_alias(&mut self, alias: String) {
        self.aliases.push(alias);
    }

    /// Whether this is the network's distinguished NULL router.
    pub fn is_null(&self) -> bool {
        self.is_null
    }

    /// This router's geographic coordinate, if known.
    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }

    /// Set this router's geographic coordinate.
    pub fn set_coordinate(&mut self, coordinate: Coordinate) {
        self.coordinate = Some(coordinate);
    }

    /// This router's interfaces, in the order they were added: `(name, global interface id)`.
    pub fn interfaces(&self) -> &[(String, InterfaceId)] {
        &self.interfaces
    }

    /// Look up an owned interface by name.
    pub fn interface(&self, name: &str) -> Option<InterfaceId> {
        self.interfaces.iter().find(|(n, _)| n == name).map(|(_, id)| *id)
    }

    pub(crate) fn own_interface(&mut self, name: String, id: InterfaceId) -> usize {
        let local_id = self.interfaces.len();
        self.interfaces.push((name, id));
        local_id
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.aliases.push(name);
    }
}
