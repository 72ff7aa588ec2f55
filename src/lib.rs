#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

//! # Confreq Library
//!
//! This library computes residue-level contact frequencies across molecular
//! dynamics trajectories: for each residue of a subject selection and each
//! category of a partner selection (grouped by residue name, chain, or
//! residue id), the fraction of frames in which the two are within a
//! distance cutoff.
//!
//! Trajectory file readers are external collaborators: frames enter through
//! the [`TrajectorySource`] trait (or [`InMemoryTrajectory`]), and
//! topologies come from [`System::from_pdb`] or are built directly.
//! Results are a labeled [`nalgebra::DMatrix`] that converts to a Polars
//! DataFrame for downstream processing.

mod contacts;
mod error;
mod search;
mod system;
mod trajectory;
mod utils;

// Re-export key public types
pub use contacts::{
    ContactFrequencies, ContactFrequency, ContactFrequencyConfig, DEFAULT_CUTOFF,
};
pub use error::AnalysisError;
pub use search::{brute_force_pairs, pairs_within};
pub use system::{is_amino_acid, Atom, AtomGroup, GroupBy, ResidueInfo, Selection, System};
pub use trajectory::{Frame, InMemoryTrajectory, PeriodicBox, TrajectorySource};
pub use utils::{load_model, write_df_to_file, DataFrameFileType};

/// Run a full contact frequency analysis over a trajectory.
///
/// Convenience wrapper around the three-phase lifecycle: setup with
/// [`ContactFrequency::new`], one [`ContactFrequency::process_frame`] per
/// frame the source yields, then [`ContactFrequency::finalize`].
///
/// # Example
///
/// ```
/// use confreq::{
///     contact_frequencies, Atom, ContactFrequencyConfig, Frame, InMemoryTrajectory,
///     ResidueInfo, System,
/// };
///
/// // One alanine and one water, in contact in one of two frames
/// let system = System::new(
///     vec![
///         Atom { name: "CA".to_string(), resindex: 0 },
///         Atom { name: "OW".to_string(), resindex: 1 },
///     ],
///     vec![
///         ResidueInfo {
///             chain: "A".to_string(),
///             resi: 1,
///             insertion: String::new(),
///             resn: "ALA".to_string(),
///         },
///         ResidueInfo {
///             chain: "X".to_string(),
///             resi: 1,
///             insertion: String::new(),
///             resn: "SOL".to_string(),
///         },
///     ],
/// )?;
/// let mut traj = InMemoryTrajectory::new(vec![
///     Frame::new(vec![[0.0; 3], [1.0, 0.0, 0.0]], None),
///     Frame::new(vec![[0.0; 3], [50.0, 0.0, 0.0]], None),
/// ]);
///
/// let result = contact_frequencies(&system, &mut traj, ContactFrequencyConfig::default())?;
/// assert_eq!(result.categories, vec!["SOL".to_string()]);
/// assert_eq!(result.frequencies[(0, 0)], 0.5);
/// # Ok::<(), confreq::AnalysisError>(())
/// ```
pub fn contact_frequencies(
    system: &System,
    trajectory: &mut dyn TrajectorySource,
    config: ContactFrequencyConfig,
) -> Result<ContactFrequencies, AnalysisError> {
    let mut analysis = ContactFrequency::new(system, config)?;
    analysis.run(trajectory)?;
    analysis.finalize()
}
