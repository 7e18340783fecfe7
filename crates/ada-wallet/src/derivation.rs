//! Derivation tree built before storage ids exist.
//!
//! Nodes live in an arena and are addressed by a placeholder
//! `KeyDerivationId` assigned in discovery order. `flatten` turns the arena
//! into an `InsertPlan`: parent-before-child rows for the persistence layer
//! plus the addresses found at each node, so the caller can map storage ids
//! back to the addresses and their BIP32 paths.

use ada_types::Addressing;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Locally assigned, monotonically increasing node id.
pub type KeyDerivationId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    parent: Option<KeyDerivationId>,
    level: u32,
    index: u32,
    addresses: Vec<String>,
}

/// One row to persist. Parents always precede their children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRow {
    pub id: KeyDerivationId,
    pub parent: Option<KeyDerivationId>,
    pub level: u32,
    pub index: u32,
}

/// Flattened tree handed to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertPlan {
    pub account: Addressing,
    pub rows: Vec<InsertRow>,
    pub addresses_by_id: BTreeMap<KeyDerivationId, Vec<String>>,
}

impl InsertPlan {
    /// Full path of the node `id`.
    pub fn addressing_for(&self, id: KeyDerivationId) -> Option<Addressing> {
        let by_id: BTreeMap<KeyDerivationId, &InsertRow> = self.rows.iter().map(|r| (r.id, r)).collect();
        let mut suffix = Vec::new();
        let mut cursor = by_id.get(&id).copied();
        while let Some(row) = cursor {
            if row.level <= self.account.end_level() {
                break;
            }
            suffix.push(row.index);
            cursor = row.parent.and_then(|p| by_id.get(&p).copied());
        }
        if cursor.is_none() {
            return None;
        }
        suffix.reverse();
        let mut path = self.account.path.clone();
        path.extend(suffix);
        Some(Addressing {
            path,
            start_level: self.account.start_level,
        })
    }

    /// Every discovered address with its path, in id order.
    pub fn addresses(&self) -> Vec<(String, Addressing)> {
        let mut found = Vec::new();
        for (id, addrs) in &self.addresses_by_id {
            let Some(addressing) = self.addressing_for(*id) else {
                continue;
            };
            for a in addrs {
                found.push((a.clone(), addressing.clone()));
            }
        }
        found
    }
}

/// Arena of derivation nodes below one account.
#[derive(Debug, Clone)]
pub struct DerivationTree {
    account: Addressing,
    nodes: Vec<Node>,
    children: BTreeMap<(KeyDerivationId, u32), KeyDerivationId>,
}

impl DerivationTree {
    /// New tree rooted at `account`, which becomes node 0.
    pub fn new(account: Addressing) -> Self {
        let root = Node {
            parent: None,
            level: account.end_level(),
            index: account.path.last().copied().unwrap_or(0),
            addresses: Vec::new(),
        };
        Self {
            account,
            nodes: vec![root],
            children: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> KeyDerivationId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child `index` of `parent`, created on first use.
    pub fn child(&mut self, parent: KeyDerivationId, index: u32) -> KeyDerivationId {
        if let Some(&id) = self.children.get(&(parent, index)) {
            return id;
        }
        let level = self.nodes[parent as usize].level + 1;
        let id = self.nodes.len() as KeyDerivationId;
        self.nodes.push(Node {
            parent: Some(parent),
            level,
            index,
            addresses: Vec::new(),
        });
        self.children.insert((parent, index), id);
        id
    }

    /// Record `address` at `chain/index` below the account.
    pub fn insert_address(&mut self, chain: u32, index: u32, address: String) -> KeyDerivationId {
        let chain_node = self.child(self.root(), chain);
        let id = self.child(chain_node, index);
        self.nodes[id as usize].addresses.push(address);
        id
    }

    pub fn flatten(self) -> InsertPlan {
        let mut rows = Vec::with_capacity(self.nodes.len());
        let mut addresses_by_id = BTreeMap::new();
        for (i, node) in self.nodes.into_iter().enumerate() {
            let id = i as KeyDerivationId;
            rows.push(InsertRow {
                id,
                parent: node.parent,
                level: node.level,
                index: node.index,
            });
            if !node.addresses.is_empty() {
                addresses_by_id.insert(id, node.addresses);
            }
        }
        InsertPlan {
            account: self.account,
            rows,
            addresses_by_id,
        }
    }
}
