//! Labeled, time-indexed table of spots.
//!
//! Every spot is keyed by `(t_stamp, label)`: `t_stamp` is a frame index and
//! `label` a trajectory identity. Payload columns (coordinates, the real
//! valued time `t`, ...) live in a dense matrix with one row per spot.
//!
//! Rows are always kept sorted by key and keys are unique. A *segment* is the
//! set of rows sharing one label, in `t_stamp` order.

mod labels;
mod measures;
mod segments;

pub use labels::LabelArena;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default index level names.
pub const INDEX_NAMES: [&str; 2] = ["t_stamp", "label"];

/// Composite key of a spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpotKey {
    pub t_stamp: i64,
    pub label: i64,
}

impl SpotKey {
    pub fn new(t_stamp: i64, label: i64) -> Self {
        Self { t_stamp, label }
    }
}

impl fmt::Display for SpotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.t_stamp, self.label)
    }
}

/// Row-wise serialized form of a spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotRecord {
    pub t_stamp: i64,
    pub label: i64,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

/// Table of spots indexed by `(t_stamp, label)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectories {
    index_names: Vec<String>,
    columns: Vec<String>,
    index: Vec<SpotKey>,
    data: DMatrix<f64>,
}

impl Trajectories {
    /// Create a table from `(key, values)` rows.
    ///
    /// # Arguments
    /// * `columns` - Payload column names
    /// * `rows` - One entry per spot; `values` must follow `columns`
    ///
    /// # Returns
    /// The table sorted by key, or `Error::InvalidInput` on a duplicate key or
    /// a row of the wrong width.
    pub fn new<S: AsRef<str>>(columns: &[S], rows: Vec<(SpotKey, Vec<f64>)>) -> Result<Self> {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();

        if let Some((key, values)) = rows.iter().find(|(_, v)| v.len() != columns.len()) {
            return Err(Error::InvalidInput(format!(
                "spot {} has {} values for {} columns",
                key,
                values.len(),
                columns.len()
            )));
        }

        let index: Vec<SpotKey> = rows.iter().map(|(key, _)| *key).collect();
        let data = DMatrix::from_fn(rows.len(), columns.len(), |i, j| rows[i].1[j]);

        let (index, data) =
            sort_rows(index, data).map_err(|key| Error::InvalidInput(format!("duplicate spot {}", key)))?;
        Ok(Self {
            index_names: INDEX_NAMES.iter().map(|s| s.to_string()).collect(),
            columns,
            index,
            data,
        })
    }

    /// Create an empty table with the given columns.
    pub fn empty<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            index_names: INDEX_NAMES.iter().map(|s| s.to_string()).collect(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            index: Vec::new(),
            data: DMatrix::zeros(0, columns.len()),
        }
    }

    /// Build a table from serialized records.
    ///
    /// Columns are taken from the first record; every record must carry the
    /// same set of columns.
    pub fn from_records(records: Vec<SpotRecord>) -> Result<Self> {
        let columns: Vec<String> = match records.first() {
            Some(first) => first.values.keys().cloned().collect(),
            None => return Ok(Self::empty::<&str>(&[])),
        };

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let key = SpotKey::new(record.t_stamp, record.label);
            if record.values.len() != columns.len()
                || !columns.iter().all(|c| record.values.contains_key(c))
            {
                return Err(Error::InvalidInput(format!(
                    "spot {} does not carry columns {:?}",
                    key, columns
                )));
            }
            let values = columns.iter().map(|c| record.values[c]).collect();
            rows.push((key, values));
        }

        Self::new(&columns, rows)
    }

    /// Serialize the table row by row.
    pub fn to_records(&self) -> Vec<SpotRecord> {
        self.index
            .iter()
            .enumerate()
            .map(|(row, key)| SpotRecord {
                t_stamp: key.t_stamp,
                label: key.label,
                values: self
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(j, c)| (c.clone(), self.data[(row, j)]))
                    .collect(),
            })
            .collect()
    }

    // ===== Accessors =====

    /// Number of spots.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Spot keys in row order (sorted).
    pub fn index(&self) -> &[SpotKey] {
        &self.index
    }

    pub fn index_names(&self) -> &[String] {
        &self.index_names
    }

    /// Rename the index levels. Only used to describe externally built tables.
    pub fn set_index_names<S: AsRef<str>>(&mut self, names: &[S]) {
        self.index_names = names.iter().map(|n| n.as_ref().to_string()).collect();
    }

    /// Payload matrix (one row per spot, one column per payload column).
    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Position of a column, or `Error::MissingColumns`.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::MissingColumns(vec![name.to_string()]))
    }

    /// Positions of several columns.
    pub fn column_indices<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        let missing: Vec<String> = names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| !self.columns.iter().any(|c| c == n))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingColumns(missing));
        }
        names.iter().map(|n| self.column_index(n.as_ref())).collect()
    }

    /// Copy of one column in row order.
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let j = self.column_index(name)?;
        Ok(self.data.column(j).iter().copied().collect())
    }

    /// Row holding `key`, if any.
    pub fn row_of(&self, key: &SpotKey) -> Option<usize> {
        self.index.binary_search(key).ok()
    }

    /// Value of `column` for the spot `key`.
    pub fn get(&self, key: &SpotKey, column: &str) -> Result<f64> {
        let row = self
            .row_of(key)
            .ok_or_else(|| Error::InvalidInput(format!("spot {} not found", key)))?;
        Ok(self.data[(row, self.column_index(column)?)])
    }

    /// Values of the given column positions for one row.
    pub fn position(&self, row: usize, cols: &[usize]) -> DVector<f64> {
        DVector::from_iterator(cols.len(), cols.iter().map(|&j| self.data[(row, j)]))
    }

    /// Add a column, or overwrite it if it already exists.
    pub fn add_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(Error::InvalidInput(format!(
                "column '{}' has {} values for {} spots",
                name,
                values.len(),
                self.len()
            )));
        }

        if let Ok(j) = self.column_index(name) {
            for (row, value) in values.into_iter().enumerate() {
                self.data[(row, j)] = value;
            }
            return Ok(());
        }

        let old = &self.data;
        let ncols = old.ncols();
        self.data = DMatrix::from_fn(old.nrows(), ncols + 1, |i, j| {
            if j < ncols {
                old[(i, j)]
            } else {
                values[i]
            }
        });
        self.columns.push(name.to_string());
        Ok(())
    }

    // ===== Structure =====

    /// Check that the table has the given index levels (order matters) and
    /// columns (order does not matter).
    ///
    /// # Returns
    /// `Error::MissingIndex` or `Error::MissingColumns` naming what is missing.
    pub fn check_structure(&self, index: Option<&[&str]>, columns: Option<&[&str]>) -> Result<()> {
        if let Some(index) = index {
            let expected: Vec<String> = index.iter().map(|n| n.to_string()).collect();
            if self.index_names != expected {
                let missing: Vec<String> = expected
                    .iter()
                    .filter(|n| !self.index_names.contains(n))
                    .cloned()
                    .collect();
                // Same names in another order: report the expected layout
                return Err(Error::MissingIndex(if missing.is_empty() { expected } else { missing }));
            }
        }

        if let Some(columns) = columns {
            let missing: Vec<String> = columns
                .iter()
                .filter(|c| !self.columns.iter().any(|own| own == *c))
                .map(|c| c.to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if !missing.is_empty() {
                return Err(Error::MissingColumns(missing));
            }
        }

        Ok(())
    }

    // ===== Getters =====

    /// Distinct frame indices, sorted.
    pub fn t_stamps(&self) -> Vec<i64> {
        let mut t_stamps: Vec<i64> = self.index.iter().map(|k| k.t_stamp).collect();
        t_stamps.dedup();
        t_stamps
    }

    /// Distinct labels, sorted.
    pub fn labels(&self) -> Vec<i64> {
        self.index
            .iter()
            .map(|k| k.label)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Rows of every segment, in `t_stamp` order.
    pub fn segment_idxs(&self) -> BTreeMap<i64, Vec<usize>> {
        let mut segments: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (row, key) in self.index.iter().enumerate() {
            segments.entry(key.label).or_default().push(row);
        }
        segments
    }

    /// First and last `t_stamp` of every segment.
    pub fn get_bounds(&self) -> BTreeMap<i64, (i64, i64)> {
        self.segment_idxs()
            .into_iter()
            .map(|(label, rows)| {
                let first = self.index[rows[0]].t_stamp;
                let last = self.index[rows[rows.len() - 1]].t_stamp;
                (label, (first, last))
            })
            .collect()
    }

    /// Values of `column` at the first and last spot of every segment.
    pub fn get_time_bounds(&self, column: &str) -> Result<BTreeMap<i64, (f64, f64)>> {
        let j = self.column_index(column)?;
        Ok(self
            .segment_idxs()
            .into_iter()
            .map(|(label, rows)| {
                let first = self.data[(rows[0], j)];
                let last = self.data[(rows[rows.len() - 1], j)];
                (label, (first, last))
            })
            .collect())
    }

    /// Sub-table of one segment.
    pub fn get_segment(&self, label: i64) -> Option<Self> {
        let rows: Vec<usize> = (0..self.len()).filter(|&r| self.index[r].label == label).collect();
        if rows.is_empty() {
            None
        } else {
            Some(self.select_rows(&rows))
        }
    }

    /// Every segment as its own sub-table.
    pub fn get_segments(&self) -> BTreeMap<i64, Self> {
        self.segment_idxs()
            .into_iter()
            .map(|(label, rows)| (label, self.select_rows(&rows)))
            .collect()
    }

    /// Labels of the `n` longest segments, shortest of them first.
    pub fn get_longest_segments(&self, n: usize) -> Vec<i64> {
        let sorted = self.labels_by_length();
        sorted[sorted.len().saturating_sub(n)..].to_vec()
    }

    /// Labels of the `n` shortest segments, shortest first.
    pub fn get_shortest_segments(&self, n: usize) -> Vec<i64> {
        self.labels_by_length().into_iter().take(n).collect()
    }

    fn labels_by_length(&self) -> Vec<i64> {
        let mut lengths: Vec<(usize, i64)> = self
            .segment_idxs()
            .into_iter()
            .map(|(label, rows)| (rows.len(), label))
            .collect();
        lengths.sort();
        lengths.into_iter().map(|(_, label)| label).collect()
    }

    // ===== Relabeling =====

    /// Replace the label of every row.
    ///
    /// # Arguments
    /// * `new_labels` - One label per row, aligned with the current row order
    ///
    /// # Returns
    /// `Error::PostCondition` if two spots end up with the same key; the
    /// table is left untouched in that case.
    pub fn relabel(&mut self, new_labels: &[i64]) -> Result<()> {
        if new_labels.len() != self.len() {
            return Err(Error::InvalidInput(format!(
                "{} labels given for {} spots",
                new_labels.len(),
                self.len()
            )));
        }

        let index: Vec<SpotKey> = self
            .index
            .iter()
            .zip(new_labels)
            .map(|(key, &label)| SpotKey::new(key.t_stamp, label))
            .collect();
        let data = self.data.clone();
        self.replace_rows(index, data)
            .map_err(|key| Error::PostCondition(format!("relabeling produced duplicate spot {}", key)))
    }

    /// Renumber labels as `0..n`, in order of first appearance in time.
    pub fn relabel_fromzero(&mut self) -> Result<()> {
        let mut mapping: BTreeMap<i64, i64> = BTreeMap::new();
        let new_labels: Vec<i64> = self
            .index
            .iter()
            .map(|key| {
                let next = mapping.len() as i64;
                *mapping.entry(key.label).or_insert(next)
            })
            .collect();
        self.relabel(&new_labels)
    }

    // ===== Internal helpers =====

    /// Sub-table made of the given rows (rows must be in ascending order).
    pub(crate) fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            index_names: self.index_names.clone(),
            columns: self.columns.clone(),
            index: rows.iter().map(|&r| self.index[r]).collect(),
            data: self.data.select_rows(rows.iter()),
        }
    }

    /// Replace index and data together; rows are re-sorted.
    ///
    /// On a duplicated key the table is left untouched and the key returned.
    pub(crate) fn replace_rows(&mut self, index: Vec<SpotKey>, data: DMatrix<f64>) -> std::result::Result<(), SpotKey> {
        let (index, data) = sort_rows(index, data)?;
        self.index = index;
        self.data = data;
        Ok(())
    }

    pub(crate) fn data_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.data
    }
}

/// Sort rows by key; returns the first duplicated key if keys collide.
fn sort_rows(index: Vec<SpotKey>, data: DMatrix<f64>) -> std::result::Result<(Vec<SpotKey>, DMatrix<f64>), SpotKey> {
    let mut order: Vec<usize> = (0..index.len()).collect();
    order.sort_by_key(|&r| index[r]);

    let (index, data) = if order.windows(2).all(|w| w[0] < w[1]) {
        (index, data)
    } else {
        let sorted: Vec<SpotKey> = order.iter().map(|&r| index[r]).collect();
        (sorted, data.select_rows(order.iter()))
    };

    match index.windows(2).find(|w| w[0] == w[1]) {
        Some(w) => Err(w[0]),
        None => Ok((index, data)),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Table with columns `t, x, y` from `(t_stamp, label, x, y)` tuples; `t = t_stamp`.
    pub(crate) fn make_trajs(spots: &[(i64, i64, f64, f64)]) -> Trajectories {
        let rows = spots
            .iter()
            .map(|&(t, label, x, y)| (SpotKey::new(t, label), vec![t as f64, x, y]))
            .collect();
        Trajectories::new(&["t", "x", "y"], rows).unwrap()
    }

    // ===== Construction =====

    #[test]
    fn test_new_sorts_rows() {
        let trajs = make_trajs(&[(1, 0, 1.0, 0.0), (0, 1, 5.0, 5.0), (0, 0, 0.0, 0.0)]);

        assert_eq!(
            trajs.index(),
            &[SpotKey::new(0, 0), SpotKey::new(0, 1), SpotKey::new(1, 0)]
        );
        // Payload moved with its key
        assert_relative_eq!(trajs.get(&SpotKey::new(0, 1), "x").unwrap(), 5.0);
        assert_relative_eq!(trajs.get(&SpotKey::new(1, 0), "x").unwrap(), 1.0);
    }

    #[test]
    fn test_new_rejects_duplicate_keys() {
        let rows = vec![
            (SpotKey::new(0, 0), vec![0.0]),
            (SpotKey::new(0, 0), vec![1.0]),
        ];
        assert!(matches!(Trajectories::new(&["x"], rows), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_new_rejects_wrong_width() {
        let rows = vec![(SpotKey::new(0, 0), vec![0.0, 1.0])];
        assert!(Trajectories::new(&["x"], rows).is_err());
    }

    #[test]
    fn test_records_round_trip_through_json() {
        let trajs = make_trajs(&[(0, 0, 1.0, 2.0), (1, 0, 3.0, 4.0)]);
        let json = serde_json::to_string(&trajs.to_records()).unwrap();
        let records: Vec<SpotRecord> = serde_json::from_str(&json).unwrap();
        let back = Trajectories::from_records(records).unwrap();

        assert_eq!(back.index(), trajs.index());
        assert_relative_eq!(back.get(&SpotKey::new(1, 0), "y").unwrap(), 4.0);
    }

    #[test]
    fn test_from_records_requires_same_columns() {
        let json = r#"[
            {"t_stamp": 0, "label": 0, "t": 0.0, "x": 1.0},
            {"t_stamp": 1, "label": 0, "t": 1.0}
        ]"#;
        let records: Vec<SpotRecord> = serde_json::from_str(json).unwrap();
        assert!(Trajectories::from_records(records).is_err());
    }

    // ===== Structure =====

    #[test]
    fn test_check_structure_ok() {
        let trajs = make_trajs(&[(0, 0, 0.0, 0.0)]);
        assert!(trajs
            .check_structure(Some(&["t_stamp", "label"][..]), Some(&["t", "x", "y"][..]))
            .is_ok());
    }

    #[test]
    fn test_check_structure_missing_columns() {
        let trajs = make_trajs(&[(0, 0, 0.0, 0.0)]);
        let err = trajs.check_structure(None, Some(&["t", "x", "y", "z"][..])).unwrap_err();
        match err {
            Error::MissingColumns(missing) => assert_eq!(missing, vec!["z".to_string()]),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_check_structure_missing_index() {
        let mut trajs = make_trajs(&[(0, 0, 0.0, 0.0)]);
        trajs.set_index_names(&["frame", "label"]);
        let err = trajs.check_structure(Some(&["t_stamp", "label"][..]), None).unwrap_err();
        match err {
            Error::MissingIndex(missing) => assert_eq!(missing, vec!["t_stamp".to_string()]),
            other => panic!("unexpected error {:?}", other),
        }
    }

    // ===== Getters =====

    #[test]
    fn test_labels_and_t_stamps() {
        let trajs = make_trajs(&[(2, 5, 0.0, 0.0), (0, 3, 0.0, 0.0), (1, 5, 0.0, 0.0), (0, 5, 0.0, 0.0)]);
        assert_eq!(trajs.labels(), vec![3, 5]);
        assert_eq!(trajs.t_stamps(), vec![0, 1, 2]);
    }

    #[test]
    fn test_bounds_and_segments() {
        let trajs = make_trajs(&[
            (0, 0, 0.0, 0.0),
            (1, 0, 1.0, 0.0),
            (2, 0, 2.0, 0.0),
            (4, 1, 0.0, 0.0),
            (5, 1, 0.0, 0.0),
        ]);

        let bounds = trajs.get_bounds();
        assert_eq!(bounds[&0], (0, 2));
        assert_eq!(bounds[&1], (4, 5));

        let time_bounds = trajs.get_time_bounds("x").unwrap();
        assert_eq!(time_bounds[&0], (0.0, 2.0));

        let segment = trajs.get_segment(1).unwrap();
        assert_eq!(segment.len(), 2);
        assert!(trajs.get_segment(7).is_none());

        assert_eq!(trajs.get_segments().len(), 2);
        assert_eq!(trajs.get_longest_segments(1), vec![0]);
        assert_eq!(trajs.get_shortest_segments(1), vec![1]);
    }

    #[test]
    fn test_add_column() {
        let mut trajs = make_trajs(&[(0, 0, 1.0, 2.0), (1, 0, 3.0, 4.0)]);
        trajs.add_column("z", vec![7.0, 8.0]).unwrap();
        assert_eq!(trajs.columns().len(), 4);
        assert_eq!(trajs.column("z").unwrap(), vec![7.0, 8.0]);

        trajs.add_column("x", vec![0.0, 0.0]).unwrap();
        assert_eq!(trajs.column("x").unwrap(), vec![0.0, 0.0]);
        assert!(trajs.add_column("w", vec![1.0]).is_err());
    }

    // ===== Relabeling =====

    #[test]
    fn test_relabel_resorts() {
        let mut trajs = make_trajs(&[(0, 0, 0.0, 0.0), (0, 1, 1.0, 1.0)]);
        trajs.relabel(&[9, 4]).unwrap();

        assert_eq!(trajs.index(), &[SpotKey::new(0, 4), SpotKey::new(0, 9)]);
        assert_relative_eq!(trajs.get(&SpotKey::new(0, 4), "x").unwrap(), 1.0);
    }

    #[test]
    fn test_relabel_collision_is_post_condition() {
        let mut trajs = make_trajs(&[(0, 0, 0.0, 0.0), (0, 1, 1.0, 1.0)]);
        let before = trajs.clone();
        let err = trajs.relabel(&[3, 3]).unwrap_err();

        assert!(matches!(err, Error::PostCondition(_)));
        assert_eq!(trajs, before);
    }

    #[test]
    fn test_replace_rows_duplicate_leaves_table_untouched() {
        let mut trajs = make_trajs(&[(0, 0, 0.0, 0.0), (1, 0, 1.0, 1.0)]);
        let before = trajs.clone();

        let index = vec![SpotKey::new(2, 5), SpotKey::new(2, 5)];
        let data = DMatrix::from_element(2, 3, 7.0);
        assert_eq!(trajs.replace_rows(index, data), Err(SpotKey::new(2, 5)));
        assert_eq!(trajs, before);
    }

    #[test]
    fn test_relabel_wrong_length() {
        let mut trajs = make_trajs(&[(0, 0, 0.0, 0.0)]);
        assert!(matches!(trajs.relabel(&[1, 2]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_relabel_fromzero() {
        let mut trajs = make_trajs(&[(0, 10, 0.0, 0.0), (0, 4, 0.0, 0.0), (1, 10, 0.0, 0.0), (2, 7, 0.0, 0.0)]);
        trajs.relabel_fromzero().unwrap();

        // First appearance order: 4 (t=0), 10 (t=0), 7 (t=2)
        assert_eq!(trajs.labels(), vec![0, 1, 2]);
        assert_eq!(trajs.get_bounds()[&1], (0, 1));
        assert_eq!(trajs.get_bounds()[&2], (2, 2));
    }
}
