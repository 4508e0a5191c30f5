/////////////////////////////////////////////////////////////////////////////////////////////
//
// Matches test points against stored rows within per-argument tolerances.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # find
//!
//! Tolerance matching of test points against stored rows.

use serde::{Deserialize, Serialize};

use crate::{
    config::{FindOptions, MatchMode},
    error::{DataKitError, Result},
};

/// Stored rows matched by [`find_rows`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowMatches {
    /// Ascending row indices (all-matches mode), or one row per found test
    /// point in test order (once mode).
    Flat(Vec<usize>),
    /// The matching rows of each found test point.
    Mapped(Vec<Vec<usize>>),
}

impl RowMatches {
    /// Every matched row, flattened.
    pub fn rows(&self) -> Vec<usize> {
        match self {
            RowMatches::Flat(rows) => rows.clone(),
            RowMatches::Mapped(rows) => rows.iter().flatten().copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RowMatches::Flat(rows) => rows.is_empty(),
            RowMatches::Mapped(rows) => rows.iter().all(Vec::is_empty),
        }
    }
}

/// Result of a search: the matched rows and the test points that found any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindOutput {
    pub rows: RowMatches,
    pub found: Vec<usize>,
}

/// One searchable argument: its name, stored values (one per row) and test
/// values (one per test point).
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchArg<'a> {
    pub name: &'a str,
    pub stored: &'a [f64],
    pub test: &'a [f64],
}

/// Finds the stored rows within tolerance of each test point.
///
/// `nrows` is the number of stored rows; every `stored` slice must have that
/// length. Arguments are AND-combined for one test point.
pub(crate) fn find_rows(search: &[SearchArg<'_>], nrows: usize, opts: &FindOptions) -> Result<FindOutput> {
    let ntest = match search.first() {
        Some(arg) => arg.test.len(),
        None => return Err(DataKitError::invalid("args", "no searchable arguments")),
    };
    for arg in search {
        if arg.stored.len() != nrows {
            return Err(DataKitError::ShapeMismatch {
                context: format!("stored values of '{}'", arg.name),
                expected: vec![nrows],
                found: vec![arg.stored.len()],
            });
        }
        if arg.test.len() != ntest {
            return Err(DataKitError::ShapeMismatch {
                context: format!("test values of '{}'", arg.name),
                expected: vec![ntest],
                found: vec![arg.test.len()],
            });
        }
    }

    let candidates = match &opts.mask {
        Some(mask) => mask.resolve(nrows)?,
        None => (0..nrows).collect(),
    };
    let tols: Vec<f64> = search.iter().map(|a| opts.tol_for(a.name)).collect();

    let mut used = vec![false; nrows];
    let mut flat = Vec::new();
    let mut mapped = Vec::new();
    let mut found = Vec::new();

    for t in 0..ntest {
        let matches: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&i| {
                search
                    .iter()
                    .zip(&tols)
                    .all(|(arg, tol)| (arg.stored[i] - arg.test[t]).abs() <= *tol)
            })
            .collect();
        if matches.is_empty() {
            continue;
        }

        match opts.mode {
            MatchMode::All => {
                matches.iter().for_each(|&i| used[i] = true);
                found.push(t);
            }
            MatchMode::Mapped => {
                mapped.push(matches);
                found.push(t);
            }
            MatchMode::Once => {
                if let Some(&i) = matches.iter().find(|&&i| !used[i]) {
                    used[i] = true;
                    flat.push(i);
                    found.push(t);
                }
            }
        }
    }

    let rows = match opts.mode {
        MatchMode::All => RowMatches::Flat(
            used.iter()
                .enumerate()
                .filter_map(|(i, &u)| u.then_some(i))
                .collect(),
        ),
        MatchMode::Mapped => RowMatches::Mapped(mapped),
        MatchMode::Once => RowMatches::Flat(flat),
    };

    Ok(FindOutput { rows, found })
}
