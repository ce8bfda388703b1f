//! Segment editing operations.
//!
//! All edits work in place; clone the table first to keep the original.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use nalgebra::DMatrix;

use super::{LabelArena, SpotKey, Trajectories};
use crate::{Error, Result};

impl Trajectories {
    /// Remove the given spots.
    ///
    /// # Returns
    /// `Error::InvalidInput` if one of the spots does not exist.
    pub fn remove_spots(&mut self, spots: &[SpotKey]) -> Result<()> {
        let drop: HashSet<SpotKey> = spots.iter().copied().collect();
        if let Some(missing) = drop.iter().find(|key| self.row_of(key).is_none()) {
            return Err(Error::InvalidInput(format!("spot {} not found", missing)));
        }
        self.keep_rows(|key| !drop.contains(key));
        Ok(())
    }

    /// Remove every spot of the given segments.
    pub fn remove_segments(&mut self, labels: &[i64]) -> Result<()> {
        let known: BTreeSet<i64> = self.labels().into_iter().collect();
        if let Some(missing) = labels.iter().find(|l| !known.contains(l)) {
            return Err(Error::InvalidInput(format!("segment {} not found", missing)));
        }
        let drop: HashSet<i64> = labels.iter().copied().collect();
        self.keep_rows(|key| !drop.contains(&key.label));
        Ok(())
    }

    /// Merge segments into the first label of `labels`.
    ///
    /// When several merged spots share a `t_stamp`, only the one with the
    /// lowest original label is kept.
    pub fn merge_segments(&mut self, labels: &[i64]) -> Result<()> {
        let (&target, others) = labels
            .split_first()
            .ok_or_else(|| Error::InvalidInput("no segment to merge".to_string()))?;
        let others: HashSet<i64> = others.iter().copied().collect();

        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        let mut index = Vec::new();
        // Rows are sorted by (t_stamp, label) so the first hit wins
        for (row, key) in self.index().iter().enumerate() {
            let label = if others.contains(&key.label) { target } else { key.label };
            let new_key = SpotKey::new(key.t_stamp, label);
            if seen.insert(new_key) {
                rows.push(row);
                index.push(new_key);
            }
        }

        let data = self.data().select_rows(rows.iter());
        self.replace_rows(index, data)
            .map_err(|key| Error::PostCondition(format!("merge produced duplicate spot {}", key)))
    }

    /// Split a segment after `spot`.
    ///
    /// Every spot of the same segment with a later `t_stamp` moves to a new
    /// label.
    ///
    /// # Returns
    /// The new label.
    pub fn cut_segments(&mut self, spot: SpotKey) -> Result<i64> {
        if self.row_of(&spot).is_none() {
            return Err(Error::InvalidInput(format!("spot {} not found", spot)));
        }
        let new_label = LabelArena::after(&self.labels()).fresh();

        let new_labels: Vec<i64> = self
            .index()
            .iter()
            .map(|key| {
                if key.label == spot.label && key.t_stamp > spot.t_stamp {
                    new_label
                } else {
                    key.label
                }
            })
            .collect();
        self.relabel(&new_labels)?;
        Ok(new_label)
    }

    /// Append a copy of a segment under a new label.
    ///
    /// # Returns
    /// The label of the copy.
    pub fn duplicate_segments(&mut self, label: i64) -> Result<i64> {
        let rows = self
            .segment_idxs()
            .remove(&label)
            .ok_or_else(|| Error::InvalidInput(format!("segment {} not found", label)))?;
        let new_label = LabelArena::after(&self.labels()).fresh();

        let mut index = self.index().to_vec();
        index.extend(rows.iter().map(|&r| SpotKey::new(self.index()[r].t_stamp, new_label)));

        let all_rows: Vec<usize> = (0..self.len()).chain(rows.iter().copied()).collect();
        let data = self.data().select_rows(all_rows.iter());

        self.replace_rows(index, data)
            .map_err(|key| Error::PostCondition(format!("duplicate spot {}", key)))?;
        Ok(new_label)
    }

    /// Reverse time: negate `t_stamp` and `time_column`.
    pub fn reverse(&mut self, time_column: &str) -> Result<()> {
        let j = self.column_index(time_column)?;
        let index: Vec<SpotKey> = self
            .index()
            .iter()
            .map(|key| SpotKey::new(-key.t_stamp, key.label))
            .collect();
        let mut data = self.data().clone();
        for value in data.column_mut(j).iter_mut() {
            *value = -*value;
        }

        self.replace_rows(index, data)
            .map_err(|key| Error::PostCondition(format!("duplicate spot {}", key)))
    }

    /// Concatenate two tables without mixing their labels.
    ///
    /// Labels of `self` that also appear in `other` are moved past the largest
    /// label of both tables, then the result is relabeled from zero.
    ///
    /// # Returns
    /// `Error::MissingColumns` if the tables do not share the same columns.
    pub fn merge(&self, other: &Trajectories) -> Result<Trajectories> {
        let own: BTreeSet<&String> = self.columns().iter().collect();
        let theirs: BTreeSet<&String> = other.columns().iter().collect();
        if own != theirs {
            let missing = own
                .symmetric_difference(&theirs)
                .map(|c| c.to_string())
                .collect();
            return Err(Error::MissingColumns(missing));
        }
        let other_cols = other.column_indices(self.columns())?;

        let own_labels = self.labels();
        let other_labels = other.labels();
        let mut arena = LabelArena::after(&[own_labels.as_slice(), other_labels.as_slice()].concat());
        let shared: BTreeSet<i64> = other_labels.iter().copied().collect();
        let renamed: BTreeMap<i64, i64> = own_labels
            .iter()
            .filter(|l| shared.contains(l))
            .map(|&l| (l, arena.fresh()))
            .collect();

        let n_own = self.len();
        let ncols = self.columns().len();
        let mut index: Vec<SpotKey> = self
            .index()
            .iter()
            .map(|key| SpotKey::new(key.t_stamp, *renamed.get(&key.label).unwrap_or(&key.label)))
            .collect();
        index.extend_from_slice(other.index());

        let data = DMatrix::from_fn(n_own + other.len(), ncols, |i, j| {
            if i < n_own {
                self.data()[(i, j)]
            } else {
                other.data()[(i - n_own, other_cols[j])]
            }
        });

        let mut merged = Trajectories::empty(self.columns());
        merged
            .replace_rows(index, data)
            .map_err(|key| Error::PostCondition(format!("merge produced duplicate spot {}", key)))?;
        merged.relabel_fromzero()?;
        Ok(merged)
    }

    fn keep_rows<F: Fn(&SpotKey) -> bool>(&mut self, keep: F) {
        let rows: Vec<usize> = (0..self.len()).filter(|&r| keep(&self.index()[r])).collect();
        *self = self.select_rows(&rows);
    }
}
