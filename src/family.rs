//! Families: pieces transitively connected through relationships.
//!
//! Observation ids look like `CRIM_Model_0008:1-12`. The root key is the piece
//! id before the `:`. Two pieces share a family when any chain of
//! model/derivative pairs links them. The index is built from the complete
//! list of pairs before anything can be queried, so lookups always see the
//! final grouping.

use std::collections::{BTreeSet, HashMap};

use petgraph::unionfind::UnionFind;
use serde::Serialize;

/// The piece-id portion of a composite observation id.
pub fn root_key(id: &str) -> &str {
    id.split_once(':').map_or(id, |(root, _)| root)
}

/// One family: its pieces and every observation id seen for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Family {
    pub pieces: Vec<String>,
    pub members: Vec<String>,
}

/// Root key → family, built in one pass over model/derivative pairs.
#[derive(Debug, Default)]
pub struct FamilyIndex {
    /// Root key → family slot
    roots: HashMap<String, usize>,
    /// Family slot → member ids
    families: Vec<BTreeSet<String>>,
}

impl FamilyIndex {
    pub fn build<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        // Assign every piece a slot first; the union-find is sized once
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut members: Vec<Vec<String>> = Vec::new();
        let mut links: Vec<(usize, usize)> = Vec::new();

        let mut slot_for = |id: &str| -> usize {
            let slot = *slots.entry(root_key(id).to_string()).or_insert_with(|| {
                members.push(Vec::new());
                members.len() - 1
            });
            members[slot].push(id.to_string());
            slot
        };

        for (model, derivative) in pairs {
            let a = slot_for(model);
            let b = slot_for(derivative);
            links.push((a, b));
        }

        let mut sets = UnionFind::<usize>::new(members.len());
        for &(a, b) in &links {
            sets.union(a, b);
        }

        // Collapse each root's ids into its representative's family
        let mut family_of_rep: HashMap<usize, usize> = HashMap::new();
        let mut families: Vec<BTreeSet<String>> = Vec::new();
        let mut roots = HashMap::with_capacity(slots.len());

        let mut by_slot: Vec<(String, usize)> = slots.into_iter().collect();
        by_slot.sort_by(|a, b| a.0.cmp(&b.0));

        for (root, slot) in by_slot {
            let rep = sets.find_mut(slot);
            let family = *family_of_rep.entry(rep).or_insert_with(|| {
                families.push(BTreeSet::new());
                families.len() - 1
            });
            families[family].extend(members[slot].drain(..));
            roots.insert(root, family);
        }

        log::debug!(
            "Grouped {} pairs over {} pieces into {} families",
            links.len(),
            roots.len(),
            families.len()
        );

        Self { roots, families }
    }

    /// The family of a piece id (a full observation id also works).
    pub fn family_of(&self, piece: &str) -> Option<&BTreeSet<String>> {
        self.roots
            .get(root_key(piece))
            .map(|&slot| &self.families[slot])
    }

    pub fn contains(&self, piece: &str) -> bool {
        self.roots.contains_key(root_key(piece))
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    /// Union of the families of every seed, plus the seeds that are not in
    /// the index.
    pub fn relatives<S: AsRef<str>>(&self, seeds: &[S]) -> (BTreeSet<String>, Vec<String>) {
        let mut relatives = BTreeSet::new();
        let mut missing = Vec::new();
        for seed in seeds {
            let seed = seed.as_ref();
            match self.family_of(seed) {
                Some(family) => relatives.extend(family.iter().cloned()),
                None => missing.push(seed.to_string()),
            }
        }
        (relatives, missing)
    }

    /// All families, each with its pieces sorted, ordered by first piece.
    pub fn families(&self) -> Vec<Family> {
        let mut pieces: Vec<Vec<String>> = vec![Vec::new(); self.families.len()];
        for (root, &slot) in &self.roots {
            pieces[slot].push(root.clone());
        }

        let mut out: Vec<Family> = pieces
            .into_iter()
            .zip(&self.families)
            .map(|(mut pieces, members)| {
                pieces.sort();
                Family {
                    pieces,
                    members: members.iter().cloned().collect(),
                }
            })
            .collect();
        out.sort_by(|a, b| a.pieces.cmp(&b.pieces));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_key() {
        assert_eq!(root_key("CRIM_Model_0008:1-12"), "CRIM_Model_0008");
        assert_eq!(root_key("CRIM_Mass_0001_1"), "CRIM_Mass_0001_1");
        assert_eq!(root_key("P1:3-4:extra"), "P1");
    }

    #[test]
    fn test_transitive_closure() {
        let index = FamilyIndex::build(vec![("P1:1-2", "P2:3-4"), ("P2:3-4", "P3:5-6")]);
        let family = index.family_of("P1").unwrap();
        assert!(family.contains("P3:5-6"));
        assert!(family.contains("P1:1-2"));
        assert_eq!(index.family_count(), 1);
    }

    #[test]
    fn test_late_bridge_merges_earlier_groups() {
        // Two separate families until the last row links them
        let index = FamilyIndex::build(vec![
            ("A:1", "B:2"),
            ("C:3", "D:4"),
            ("E:5", "F:6"),
            ("B:7", "C:8"),
        ]);
        assert_eq!(index.family_count(), 2);
        let abcd = index.family_of("A").unwrap();
        for id in ["A:1", "B:2", "C:3", "D:4", "B:7", "C:8"] {
            assert!(abcd.contains(id), "{id}");
        }
        assert!(!abcd.contains("E:5"));
        assert_eq!(index.family_of("D"), index.family_of("A"));
    }

    #[test]
    fn test_every_id_of_a_piece_is_kept() {
        let index = FamilyIndex::build(vec![("P1:1-2", "P2:3-4"), ("P1:9-10", "P4:1-2")]);
        let family = index.family_of("P4").unwrap();
        assert!(family.contains("P1:9-10"));
        assert!(family.contains("P2:3-4"));
    }

    #[test]
    fn test_long_chain_in_any_order_is_one_family() {
        let ids: Vec<String> = (0..50).map(|i| format!("P{i}:1")).collect();
        let mut pairs: Vec<(&str, &str)> = ids
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect();
        pairs.reverse();

        let index = FamilyIndex::build(pairs);
        assert_eq!(index.family_count(), 1);
        assert_eq!(index.family_of("P0").unwrap().len(), 50);
        assert_eq!(index.family_of("P0"), index.family_of("P49"));
    }

    #[test]
    fn test_relatives_reports_missing_seeds() {
        let index = FamilyIndex::build(vec![("P1:1", "P2:1"), ("P3:1", "P4:1")]);
        let (relatives, missing) = index.relatives(&["P2", "P9"]);
        assert_eq!(
            relatives.into_iter().collect::<Vec<_>>(),
            vec!["P1:1".to_string(), "P2:1".to_string()]
        );
        assert_eq!(missing, vec!["P9".to_string()]);
    }

    #[test]
    fn test_self_relationship() {
        let index = FamilyIndex::build(vec![("P1:1-4", "P1:8-12")]);
        assert_eq!(index.family_count(), 1);
        assert_eq!(index.family_of("P1").unwrap().len(), 2);
    }

    #[test]
    fn test_families_listing() {
        let index = FamilyIndex::build(vec![("B:1", "A:1"), ("C:1", "D:1")]);
        let families = index.families();
        assert_eq!(families.len(), 2);
        assert_eq!(families[0].pieces, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(families[0].members, vec!["A:1".to_string(), "B:1".to_string()]);
        assert_eq!(families[1].pieces, vec!["C".to_string(), "D".to_string()]);
    }

    #[test]
    fn test_empty() {
        let index = FamilyIndex::build(Vec::<(&str, &str)>::new());
        assert_eq!(index.family_count(), 0);
        assert!(index.family_of("P1").is_none());
        assert!(!index.contains("P1"));
    }
}
