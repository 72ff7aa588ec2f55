//! Residue contact frequency analysis over a trajectory.
//!
//! For every (subject residue, partner category) pair, count the fraction
//! of frames in which any atom of the residue sits within a distance
//! cutoff of any atom of a partner residue of that category. The result is
//! a (subject residues x categories) matrix of frequencies in [0, 1].
//!
//! The analysis runs in three phases: setup (once, in
//! [`ContactFrequency::new`]), per-frame accumulation, and normalization in
//! [`ContactFrequency::finalize`].

use crate::error::AnalysisError;
use crate::search::pairs_within;
use crate::system::{GroupBy, ResidueInfo, Selection, System};
use crate::trajectory::{Frame, PeriodicBox, TrajectorySource};
use nalgebra::DMatrix;
use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Default distance cutoff in Å for two atoms to count as a contact.
pub const DEFAULT_CUTOFF: f64 = 6.0;

/// Configuration of a contact frequency analysis.
#[derive(Debug, Clone)]
pub struct ContactFrequencyConfig {
    /// Subject selection; its residues become matrix rows.
    pub select: Selection,
    /// Partner selection; its residues are aggregated into matrix columns.
    pub select_other: Selection,
    /// Contact distance cutoff in Å, must be positive.
    pub cutoff: f64,
    /// Residue attribute that aggregates partner residues into columns.
    pub group_by: GroupBy,
}

impl Default for ContactFrequencyConfig {
    fn default() -> Self {
        Self {
            select: Selection::Protein,
            select_other: Selection::NotProtein,
            cutoff: DEFAULT_CUTOFF,
            group_by: GroupBy::ResidueName,
        }
    }
}

/// The contact frequency accumulator.
///
/// Built once against a [`System`]; after setup it no longer touches the
/// topology. All per-atom row/column maps are baked in up front, and each
/// processed frame adds a saturating 0/1 indicator per matrix cell.
pub struct ContactFrequency {
    n_atoms: usize,
    /// Topology atom index of every subject atom, in selection order.
    subject_atoms: Vec<usize>,
    partner_atoms: Vec<usize>,
    /// Matrix row of every subject atom's parent residue.
    subject_rows: Vec<usize>,
    /// Matrix column of every partner atom's parent residue category.
    partner_cols: Vec<usize>,
    residues: Vec<ResidueInfo>,
    categories: Vec<String>,
    cutoff: f64,
    accumulated: DMatrix<f64>,
    n_frames: usize,
}

impl ContactFrequency {
    /// Set up an analysis: resolve both selections, fix the category set,
    /// build the index maps, and allocate the zeroed accumulator.
    ///
    /// Fails fast on an empty selection or a non-positive cutoff.
    pub fn new(system: &System, config: ContactFrequencyConfig) -> Result<Self, AnalysisError> {
        if config.cutoff <= 0.0 || !config.cutoff.is_finite() {
            return Err(AnalysisError::InvalidCutoff(config.cutoff));
        }

        let subject = system.select(&config.select);
        if subject.is_empty() {
            return Err(AnalysisError::EmptySelection("subject"));
        }
        let partner = system.select(&config.select_other);
        if partner.is_empty() {
            return Err(AnalysisError::EmptySelection("partner"));
        }

        // Rows: subject residues in selection order
        let subject_residues = subject.parent_residues(system);
        let row_of: HashMap<usize, usize> = subject_residues
            .iter()
            .enumerate()
            .map(|(row, &rix)| (rix, row))
            .collect();
        let residues: Vec<ResidueInfo> = subject_residues
            .iter()
            .map(|&rix| system.residue(rix).clone())
            .collect();

        // Columns: sorted unique category values of the partner residues
        let partner_residues = partner.parent_residues(system);
        let mut categories: Vec<String> = partner_residues
            .iter()
            .map(|&rix| config.group_by.value(system.residue(rix)))
            .collect();
        categories.sort();
        categories.dedup();

        let col_of: HashMap<usize, usize> = partner_residues
            .iter()
            .map(|&rix| {
                let value = config.group_by.value(system.residue(rix));
                let col = categories
                    .binary_search(&value)
                    .expect("category set was built from these residues");
                (rix, col)
            })
            .collect();

        let subject_rows = subject
            .atom_indices()
            .iter()
            .map(|&i| row_of[&system.atoms()[i].resindex])
            .collect();
        let partner_cols = partner
            .atom_indices()
            .iter()
            .map(|&i| col_of[&system.atoms()[i].resindex])
            .collect();

        debug!(
            "Contact frequency setup: {} subject atoms in {} residues, \
             {} partner atoms in {} categories, cutoff {} Å",
            subject.len(),
            residues.len(),
            partner.len(),
            categories.len(),
            config.cutoff
        );

        Ok(Self {
            n_atoms: system.atom_count(),
            subject_atoms: subject.atom_indices().to_vec(),
            partner_atoms: partner.atom_indices().to_vec(),
            subject_rows,
            partner_cols,
            accumulated: DMatrix::zeros(residues.len(), categories.len()),
            residues,
            categories,
            cutoff: config.cutoff,
            n_frames: 0,
        })
    }

    /// Accumulate one trajectory frame.
    ///
    /// The frame must carry positions for every topology atom; the two
    /// selections' coordinates are gathered from it.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<(), AnalysisError> {
        if frame.positions.len() != self.n_atoms {
            return Err(AnalysisError::FrameMismatch {
                expected: self.n_atoms,
                got: frame.positions.len(),
            });
        }
        let pbox = frame.periodic_box()?;

        let subject: Vec<[f64; 3]> = self
            .subject_atoms
            .iter()
            .map(|&i| frame.positions[i])
            .collect();
        let partner: Vec<[f64; 3]> = self
            .partner_atoms
            .iter()
            .map(|&i| frame.positions[i])
            .collect();
        self.process_coordinates(&subject, &partner, &pbox)
    }

    /// Accumulate one frame from pre-gathered per-selection coordinates.
    ///
    /// `subject` and `partner` must hold one position per atom of the
    /// respective selection, in selection order. Within one frame, a
    /// (residue, category) cell saturates at 1 no matter how many atom
    /// pairs map onto it.
    pub fn process_coordinates(
        &mut self,
        subject: &[[f64; 3]],
        partner: &[[f64; 3]],
        pbox: &PeriodicBox,
    ) -> Result<(), AnalysisError> {
        if subject.len() != self.subject_atoms.len() {
            return Err(AnalysisError::FrameMismatch {
                expected: self.subject_atoms.len(),
                got: subject.len(),
            });
        }
        if partner.len() != self.partner_atoms.len() {
            return Err(AnalysisError::FrameMismatch {
                expected: self.partner_atoms.len(),
                got: partner.len(),
            });
        }

        let pairs = pairs_within(subject, partner, self.cutoff, pbox);

        // Per-frame 0/1 indicator, then element-wise accumulation
        let mut frame_hits = DMatrix::zeros(self.accumulated.nrows(), self.accumulated.ncols());
        for (i, j) in pairs {
            frame_hits[(self.subject_rows[i], self.partner_cols[j])] = 1.0;
        }
        self.accumulated += &frame_hits;
        self.n_frames += 1;

        trace!(
            "Frame {}: {} cells in contact",
            self.n_frames,
            frame_hits.sum()
        );
        Ok(())
    }

    /// Drive the full per-frame phase over a frame source: every frame the
    /// source yields is processed in trajectory order.
    pub fn run(&mut self, source: &mut dyn TrajectorySource) -> Result<(), AnalysisError> {
        debug!("Processing trajectory with {} frames", source.n_frames());
        while let Some(frame) = source.next_frame()? {
            self.process_frame(&frame)?;
        }
        Ok(())
    }

    /// Normalize by the number of processed frames and return the result.
    ///
    /// Errors with [`AnalysisError::NoFrames`] if nothing was processed;
    /// the accumulator is never divided by zero.
    pub fn finalize(self) -> Result<ContactFrequencies, AnalysisError> {
        if self.n_frames == 0 {
            return Err(AnalysisError::NoFrames);
        }
        debug!("Normalizing contact counts over {} frames", self.n_frames);
        Ok(ContactFrequencies {
            frequencies: self.accumulated.unscale(self.n_frames as f64),
            residues: self.residues,
            categories: self.categories,
            n_frames: self.n_frames,
        })
    }

    /// Column labels: the sorted unique category values.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Row labels: the subject residues in selection order.
    pub fn residues(&self) -> &[ResidueInfo] {
        &self.residues
    }

    /// Raw per-cell contact counts accumulated so far.
    pub fn accumulated(&self) -> &DMatrix<f64> {
        &self.accumulated
    }

    /// Number of frames processed so far.
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }
}

/// The finalized result: a frequency matrix with its row and column labels.
#[derive(Debug, Clone)]
pub struct ContactFrequencies {
    /// (subject residues x categories) matrix of per-frame contact
    /// frequencies, each in [0, 1].
    pub frequencies: DMatrix<f64>,
    /// Row labels, subject residues in selection order.
    pub residues: Vec<ResidueInfo>,
    /// Column labels, sorted unique category values.
    pub categories: Vec<String>,
    /// Number of frames the frequencies were averaged over.
    pub n_frames: usize,
}

impl ContactFrequencies {
    /// Flatten the matrix into a tidy DataFrame with one row per
    /// (residue, category) cell.
    ///
    /// Columns: `chain`, `resi`, `resn`, `category`, `frequency`.
    pub fn to_df(&self) -> PolarsResult<DataFrame> {
        let n = self.residues.len() * self.categories.len();
        let mut chains = Vec::with_capacity(n);
        let mut resis = Vec::with_capacity(n);
        let mut resns = Vec::with_capacity(n);
        let mut cats = Vec::with_capacity(n);
        let mut freqs = Vec::with_capacity(n);

        for (row, residue) in self.residues.iter().enumerate() {
            for (col, category) in self.categories.iter().enumerate() {
                chains.push(residue.chain.clone());
                resis.push(residue.resi as i64);
                resns.push(residue.resn.clone());
                cats.push(category.clone());
                freqs.push(self.frequencies[(row, col)]);
            }
        }

        df!(
            "chain" => chains,
            "resi" => resis,
            "resn" => resns,
            "category" => cats,
            "frequency" => freqs,
        )?
        .sort(["chain", "resi", "category"], Default::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::Atom;
    use crate::trajectory::InMemoryTrajectory;

    fn residue(chain: &str, resi: isize, resn: &str) -> ResidueInfo {
        ResidueInfo {
            chain: chain.to_string(),
            resi,
            insertion: String::new(),
            resn: resn.to_string(),
        }
    }

    /// One atom per residue: `n_protein` alanines followed by one residue
    /// per partner residue name.
    fn toy_system(n_protein: usize, partner_resns: &[&str]) -> System {
        let mut atoms = Vec::new();
        let mut residues = Vec::new();
        for i in 0..n_protein {
            atoms.push(Atom {
                name: "CA".to_string(),
                resindex: i,
            });
            residues.push(residue("A", i as isize + 1, "ALA"));
        }
        for (k, resn) in partner_resns.iter().enumerate() {
            atoms.push(Atom {
                name: "X".to_string(),
                resindex: n_protein + k,
            });
            residues.push(residue("X", k as isize + 1, resn));
        }
        System::new(atoms, residues).unwrap()
    }

    fn frame(positions: Vec<[f64; 3]>) -> Frame {
        Frame::new(positions, None)
    }

    #[test]
    fn matrix_shape_follows_residues_and_categories() {
        let system = toy_system(3, &["SOL", "NA", "SOL", "CL"]);
        let analysis = ContactFrequency::new(&system, ContactFrequencyConfig::default()).unwrap();

        assert_eq!(analysis.accumulated().nrows(), 3);
        assert_eq!(analysis.categories(), &["CL", "NA", "SOL"]);
        assert_eq!(analysis.residues().len(), 3);
    }

    #[test]
    fn always_in_contact_gives_unit_frequency() {
        let system = toy_system(1, &["SOL"]);
        let mut analysis =
            ContactFrequency::new(&system, ContactFrequencyConfig::default()).unwrap();

        // Subject and partner co-located for three frames
        for _ in 0..3 {
            analysis
                .process_frame(&frame(vec![[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]))
                .unwrap();
        }
        let result = analysis.finalize().unwrap();

        assert_eq!(result.frequencies.shape(), (1, 1));
        assert_eq!(result.frequencies[(0, 0)], 1.0);
        assert_eq!(result.n_frames, 3);
    }

    #[test]
    fn separated_atoms_never_contact() {
        let system = toy_system(2, &["SOL"]);
        let mut analysis =
            ContactFrequency::new(&system, ContactFrequencyConfig::default()).unwrap();

        for _ in 0..4 {
            analysis
                .process_frame(&frame(vec![
                    [0.0, 0.0, 0.0],
                    [3.0, 0.0, 0.0],
                    [100.0, 100.0, 100.0],
                ]))
                .unwrap();
        }
        let result = analysis.finalize().unwrap();
        assert!(result.frequencies.iter().all(|&f| f == 0.0));
    }

    #[test]
    fn multiple_atom_pairs_saturate_to_one_per_frame() {
        // Subject residue with two atoms, two partner waters of the same
        // category, all four atoms mutually within the cutoff: four atom
        // pairs, one cell, per-frame contribution exactly 1
        let atoms = vec![
            Atom {
                name: "CA".to_string(),
                resindex: 0,
            },
            Atom {
                name: "CB".to_string(),
                resindex: 0,
            },
            Atom {
                name: "OW".to_string(),
                resindex: 1,
            },
            Atom {
                name: "OW".to_string(),
                resindex: 2,
            },
        ];
        let residues = vec![
            residue("A", 1, "ALA"),
            residue("X", 1, "SOL"),
            residue("X", 2, "SOL"),
        ];
        let system = System::new(atoms, residues).unwrap();
        let mut analysis =
            ContactFrequency::new(&system, ContactFrequencyConfig::default()).unwrap();

        analysis
            .process_frame(&frame(vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 1.0, 0.0],
            ]))
            .unwrap();

        assert_eq!(analysis.accumulated().shape(), (1, 1));
        assert_eq!(analysis.accumulated()[(0, 0)], 1.0);
    }

    #[test]
    fn accumulation_is_monotonic_and_normalization_exact() {
        let system = toy_system(2, &["SOL", "NA"]);
        let mut analysis =
            ContactFrequency::new(&system, ContactFrequencyConfig::default()).unwrap();

        let near = frame(vec![
            [0.0, 0.0, 0.0],
            [50.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [52.0, 0.0, 0.0],
        ]);
        let far = frame(vec![
            [0.0, 0.0, 0.0],
            [50.0, 0.0, 0.0],
            [200.0, 0.0, 0.0],
            [300.0, 0.0, 0.0],
        ]);

        let mut previous = analysis.accumulated().clone();
        for f in [&near, &far, &near] {
            analysis.process_frame(f).unwrap();
            let current = analysis.accumulated().clone();
            assert!(
                current.iter().zip(previous.iter()).all(|(c, p)| c >= p),
                "accumulated counts must never decrease"
            );
            previous = current;
        }

        let accumulated = analysis.accumulated().clone();
        let n = analysis.n_frames();
        let result = analysis.finalize().unwrap();
        for (acc, freq) in accumulated.iter().zip(result.frequencies.iter()) {
            assert_eq!(acc / n as f64, *freq);
            assert!((0.0..=1.0).contains(freq));
        }
        // Residue 1 touched SOL in two of three frames
        assert_eq!(result.frequencies[(0, 1)], 2.0 / 3.0);
    }

    #[test]
    fn same_category_residues_share_a_column() {
        let system = toy_system(1, &["SOL", "SOL"]);
        let mut analysis =
            ContactFrequency::new(&system, ContactFrequencyConfig::default()).unwrap();
        assert_eq!(analysis.categories(), &["SOL"]);

        // Both waters within the cutoff of the single subject residue
        analysis
            .process_frame(&frame(vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
            ]))
            .unwrap();
        let result = analysis.finalize().unwrap();
        assert_eq!(result.frequencies.shape(), (1, 1));
        assert_eq!(result.frequencies[(0, 0)], 1.0);
    }

    #[test]
    fn grouping_by_residue_id_keeps_columns_apart() {
        let system = toy_system(1, &["SOL", "SOL"]);
        let config = ContactFrequencyConfig {
            group_by: GroupBy::ResidueId,
            ..Default::default()
        };
        let analysis = ContactFrequency::new(&system, config).unwrap();
        assert_eq!(analysis.categories(), &["1", "2"]);
    }

    #[test]
    fn configuration_errors_fail_fast() {
        let system = toy_system(2, &["SOL"]);

        let no_partner = ContactFrequency::new(
            &system,
            ContactFrequencyConfig {
                select_other: Selection::Resnames(vec!["XYZ".to_string()]),
                ..Default::default()
            },
        );
        assert!(matches!(
            no_partner,
            Err(AnalysisError::EmptySelection("partner"))
        ));

        let bad_cutoff = ContactFrequency::new(
            &system,
            ContactFrequencyConfig {
                cutoff: -2.0,
                ..Default::default()
            },
        );
        assert!(matches!(bad_cutoff, Err(AnalysisError::InvalidCutoff(_))));
    }

    #[test]
    fn zero_frames_is_a_distinct_error() {
        let system = toy_system(1, &["SOL"]);
        let analysis = ContactFrequency::new(&system, ContactFrequencyConfig::default()).unwrap();
        assert!(matches!(analysis.finalize(), Err(AnalysisError::NoFrames)));
    }

    #[test]
    fn frame_length_mismatch_is_rejected() {
        let system = toy_system(1, &["SOL"]);
        let mut analysis =
            ContactFrequency::new(&system, ContactFrequencyConfig::default()).unwrap();
        let err = analysis.process_frame(&frame(vec![[0.0; 3]]));
        assert!(matches!(
            err,
            Err(AnalysisError::FrameMismatch {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn malformed_box_aborts_the_frame() {
        let system = toy_system(1, &["SOL"]);
        let mut analysis =
            ContactFrequency::new(&system, ContactFrequencyConfig::default()).unwrap();
        let bad = Frame::new(
            vec![[0.0; 3], [1.0, 0.0, 0.0]],
            Some([10.0, 10.0, 10.0, 0.0, 90.0, 90.0]),
        );
        assert!(matches!(
            analysis.process_frame(&bad),
            Err(AnalysisError::MalformedBox(_))
        ));
        assert_eq!(analysis.n_frames(), 0);
    }

    #[test]
    fn contacts_wrap_through_periodic_boundaries() {
        let system = toy_system(1, &["SOL"]);
        let mut analysis =
            ContactFrequency::new(&system, ContactFrequencyConfig::default()).unwrap();

        // 19 Å apart inside a 20 Å box: 1 Å through the boundary
        let periodic = Frame::new(
            vec![[0.5, 10.0, 10.0], [19.5, 10.0, 10.0]],
            Some([20.0, 20.0, 20.0, 90.0, 90.0, 90.0]),
        );
        analysis.process_frame(&periodic).unwrap();
        let result = analysis.finalize().unwrap();
        assert_eq!(result.frequencies[(0, 0)], 1.0);
    }

    #[test]
    fn run_drives_a_frame_source() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let system = toy_system(1, &["SOL"]);
        let mut analysis =
            ContactFrequency::new(&system, ContactFrequencyConfig::default()).unwrap();

        let frames = vec![
            frame(vec![[0.0; 3], [1.0, 0.0, 0.0]]),
            frame(vec![[0.0; 3], [100.0, 0.0, 0.0]]),
        ];
        let mut traj = InMemoryTrajectory::new(frames);
        analysis.run(&mut traj).unwrap();
        assert_eq!(analysis.n_frames(), 2);

        let result = analysis.finalize().unwrap();
        assert_eq!(result.frequencies[(0, 0)], 0.5);
    }

    #[test]
    fn to_df_is_tidy_and_sorted() {
        let system = toy_system(2, &["SOL", "NA"]);
        let mut analysis =
            ContactFrequency::new(&system, ContactFrequencyConfig::default()).unwrap();
        analysis
            .process_frame(&frame(vec![
                [0.0, 0.0, 0.0],
                [50.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [51.0, 0.0, 0.0],
            ]))
            .unwrap();
        let df = analysis.finalize().unwrap().to_df().unwrap();

        // 2 residues x 2 categories
        assert_eq!(df.height(), 4);
        assert_eq!(
            df.get_column_names_str(),
            vec!["chain", "resi", "resn", "category", "frequency"]
        );
    }
}
