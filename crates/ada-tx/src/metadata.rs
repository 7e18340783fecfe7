//! Transaction auxiliary data.
//!
//! Metadata is a map from unsigned label to a JSON payload. Mint metadata is
//! laid out as `tag -> policy -> asset name -> payload` (CIP-25 shape).

use crate::TxError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryData {
    metadata: BTreeMap<u64, Value>,
}

impl AuxiliaryData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a label. Fails if the label is already present.
    pub fn insert(&mut self, label: u64, value: Value) -> Result<(), TxError> {
        if self.metadata.contains_key(&label) {
            return Err(TxError::Metadata(format!("duplicate metadata label {}", label)));
        }
        self.metadata.insert(label, value);
        Ok(())
    }

    pub fn get(&self, label: u64) -> Option<&Value> {
        self.metadata.get(&label)
    }

    pub fn contains(&self, label: u64) -> bool {
        self.metadata.contains_key(&label)
    }

    pub fn labels(&self) -> impl Iterator<Item = u64> + '_ {
        self.metadata.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Merge `other` into `self`. Label collisions are errors.
    pub fn merge(&mut self, other: AuxiliaryData) -> Result<(), TxError> {
        for (label, value) in other.metadata {
            self.insert(label, value)?;
        }
        Ok(())
    }

    /// Canonical bytes the reference ledger hashes.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // BTreeMap keys and serde_json object keys are both ordered.
        serde_json::to_vec(&self.metadata).unwrap_or_default()
    }
}

/// A metadata payload attached to one minted asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintTag {
    pub tag: u64,
    pub policy_id: String,
    pub asset_name: String,
    pub payload: Value,
}

/// Fold per-asset mint tags into `tag -> policy -> asset -> payload`.
pub fn mint_metadata(tags: &[MintTag]) -> Result<AuxiliaryData, TxError> {
    let mut by_tag: BTreeMap<u64, Map<String, Value>> = BTreeMap::new();
    for t in tags {
        let policies = by_tag.entry(t.tag).or_default();
        let assets = policies
            .entry(t.policy_id.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        let assets = assets
            .as_object_mut()
            .ok_or_else(|| TxError::Metadata("policy entry is not an object".into()))?;
        if assets.contains_key(&t.asset_name) {
            return Err(TxError::Metadata(format!(
                "duplicate mint metadata for {}.{} under tag {}",
                t.policy_id, t.asset_name, t.tag
            )));
        }
        assets.insert(t.asset_name.clone(), t.payload.clone());
    }

    let mut aux = AuxiliaryData::new();
    for (tag, policies) in by_tag {
        aux.insert(tag, Value::Object(policies))?;
    }
    Ok(aux)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_duplicate_label_fails() {
        let mut aux = AuxiliaryData::new();
        aux.insert(674, json!({"msg": ["hi"]})).unwrap();
        assert!(aux.insert(674, json!(1)).is_err());
        assert_eq!(aux.labels().collect::<Vec<_>>(), vec![674]);
    }

    #[test]
    fn test_mint_metadata_nesting() {
        let tags = vec![
            MintTag {
                tag: 721,
                policy_id: "p1".into(),
                asset_name: "a1".into(),
                payload: json!({"name": "One"}),
            },
            MintTag {
                tag: 721,
                policy_id: "p1".into(),
                asset_name: "a2".into(),
                payload: json!({"name": "Two"}),
            },
        ];
        let aux = mint_metadata(&tags).unwrap();
        let v = aux.get(721).unwrap();
        assert_eq!(v["p1"]["a1"]["name"], "One");
        assert_eq!(v["p1"]["a2"]["name"], "Two");
    }

    #[test]
    fn test_mint_metadata_duplicate_asset() {
        let t = MintTag {
            tag: 721,
            policy_id: "p".into(),
            asset_name: "a".into(),
            payload: json!(1),
        };
        assert!(mint_metadata(&[t.clone(), t]).is_err());
    }

    #[test]
    fn test_canonical_bytes_stable() {
        let mut a = AuxiliaryData::new();
        a.insert(2, json!({"b": 1, "a": 2})).unwrap();
        a.insert(1, json!("x")).unwrap();
        let mut b = AuxiliaryData::new();
        b.insert(1, json!("x")).unwrap();
        b.insert(2, json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());
    }
}
