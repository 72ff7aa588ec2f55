//! Spatial pair search between two coordinate sets.
//!
//! Given subject positions, partner positions, and a cutoff, find all
//! (subject, partner) index pairs within the cutoff under the frame's
//! boundary conditions. Only pairs are reported, never distances. Three
//! strategies back the same entry point:
//!
//! - no box: an R-tree over the partner set, queried per subject atom;
//! - orthorhombic box: an O(N) periodic cell list;
//! - triclinic box: minimum-image brute force, parallelized over the
//!   subject atoms.

use crate::trajectory::PeriodicBox;
use rayon::prelude::*;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use std::collections::HashMap;
use tracing::trace;

/// An indexed point stored in the R-tree.
type IndexedPoint = GeomWithData<[f64; 3], usize>;

/// Find all (subject, partner) atom index pairs within `cutoff`.
///
/// Pair order is unspecified; a pair appears at most once. The cutoff test
/// is inclusive.
pub fn pairs_within(
    subject: &[[f64; 3]],
    partner: &[[f64; 3]],
    cutoff: f64,
    pbox: &PeriodicBox,
) -> Vec<(usize, usize)> {
    if subject.is_empty() || partner.is_empty() {
        return Vec::new();
    }

    let pairs = match pbox {
        PeriodicBox::None => rtree_pairs(subject, partner, cutoff),
        PeriodicBox::Orthorhombic(lengths) => {
            cell_list_pairs(subject, partner, cutoff, *lengths, pbox)
        }
        PeriodicBox::Triclinic { .. } => brute_force_pairs(subject, partner, cutoff, pbox),
    };
    trace!(
        "Pair search: {} subject x {} partner atoms -> {} pairs",
        subject.len(),
        partner.len(),
        pairs.len()
    );
    pairs
}

/// Aperiodic search: R-tree over the partner set, one range query per
/// subject atom.
fn rtree_pairs(subject: &[[f64; 3]], partner: &[[f64; 3]], cutoff: f64) -> Vec<(usize, usize)> {
    let tree: RTree<IndexedPoint> = RTree::bulk_load(
        partner
            .iter()
            .enumerate()
            .map(|(j, p)| IndexedPoint::new(*p, j))
            .collect(),
    );
    let max_radius_squared = cutoff * cutoff;

    subject
        .iter()
        .enumerate()
        .flat_map(|(i, p)| {
            tree.locate_within_distance(*p, max_radius_squared)
                .map(move |neighbor| (i, neighbor.data))
        })
        .collect()
}

/// Periodic cell list for orthorhombic boxes.
///
/// Partner atoms are binned into a grid covering the primary cell; each
/// subject atom then only checks the wrapped 3x3x3 neighborhood of its own
/// cell. Cell widths never drop below the cutoff, so the neighborhood is
/// exhaustive.
fn cell_list_pairs(
    subject: &[[f64; 3]],
    partner: &[[f64; 3]],
    cutoff: f64,
    lengths: [f64; 3],
    pbox: &PeriodicBox,
) -> Vec<(usize, usize)> {
    let max_radius_squared = cutoff * cutoff;

    let n_cells: [i64; 3] = [
        ((lengths[0] / cutoff).floor() as i64).max(1),
        ((lengths[1] / cutoff).floor() as i64).max(1),
        ((lengths[2] / cutoff).floor() as i64).max(1),
    ];
    let cell_widths = [
        lengths[0] / n_cells[0] as f64,
        lengths[1] / n_cells[1] as f64,
        lengths[2] / n_cells[2] as f64,
    ];

    let cell_of = |p: &[f64; 3]| -> (i64, i64, i64) {
        let mut idx = [0i64; 3];
        for d in 0..3 {
            // Wrap into [0, l) before binning
            let x = p[d] - lengths[d] * (p[d] / lengths[d]).floor();
            idx[d] = ((x / cell_widths[d]) as i64).min(n_cells[d] - 1);
        }
        (idx[0], idx[1], idx[2])
    };

    let mut cells: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
    for (j, p) in partner.iter().enumerate() {
        cells.entry(cell_of(p)).or_default().push(j);
    }

    let mut pairs = Vec::new();
    let mut neighborhood = Vec::with_capacity(27);
    for (i, p) in subject.iter().enumerate() {
        let home = cell_of(p);

        // Wrapped neighbor cells; small boxes fold onto themselves, so
        // deduplicate before visiting
        neighborhood.clear();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = (
                        (home.0 + dx).rem_euclid(n_cells[0]),
                        (home.1 + dy).rem_euclid(n_cells[1]),
                        (home.2 + dz).rem_euclid(n_cells[2]),
                    );
                    if !neighborhood.contains(&key) {
                        neighborhood.push(key);
                    }
                }
            }
        }

        for key in &neighborhood {
            if let Some(members) = cells.get(key) {
                for &j in members {
                    if pbox.distance_squared(p, &partner[j]) <= max_radius_squared {
                        pairs.push((i, j));
                    }
                }
            }
        }
    }
    pairs
}

/// Minimum-image brute force; the fallback for triclinic cells and the
/// reference implementation the faster paths are checked against.
pub fn brute_force_pairs(
    subject: &[[f64; 3]],
    partner: &[[f64; 3]],
    cutoff: f64,
    pbox: &PeriodicBox,
) -> Vec<(usize, usize)> {
    let max_radius_squared = cutoff * cutoff;
    subject
        .par_iter()
        .enumerate()
        .flat_map_iter(|(i, a)| {
            partner.iter().enumerate().filter_map(move |(j, b)| {
                (pbox.distance_squared(a, b) <= max_radius_squared).then_some((i, j))
            })
        })
        .collect()
}
