//! Topology model: atoms, residues, and typed atom selections.
//!
//! A [`System`] is the static side of an analysis: which atoms exist, which
//! residue each atom belongs to, and the residue annotations used for
//! selections and grouping. Coordinates live in [`crate::trajectory::Frame`]
//! and are supplied per frame.

use crate::error::AnalysisError;
use crate::trajectory::Frame;
use pdbtbx::{ContainsAtomConformer, ContainsAtomConformerResidue, ContainsAtomConformerResidueChain, ContainsAtomConformerResidueChainModel, PDB};
use std::collections::HashMap;
use tracing::debug;

/// An atom in the topology: its name and the global index of its parent
/// residue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    /// Atom name, e.g. "CA".
    pub name: String,
    /// Global index into [`System::residues`].
    pub resindex: usize,
}

/// Annotations of one residue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResidueInfo {
    /// Chain identifier.
    pub chain: String,
    /// Residue sequence number.
    pub resi: isize,
    /// Insertion code, empty if absent.
    pub insertion: String,
    /// Residue name, e.g. "ALA" or "SOL".
    pub resn: String,
}

/// Immutable topology of a simulated system.
#[derive(Debug, Clone)]
pub struct System {
    atoms: Vec<Atom>,
    residues: Vec<ResidueInfo>,
}

impl System {
    /// Build a topology from atom and residue lists.
    ///
    /// Every atom's `resindex` must point into `residues`.
    pub fn new(atoms: Vec<Atom>, residues: Vec<ResidueInfo>) -> Result<Self, AnalysisError> {
        if let Some(atom) = atoms.iter().find(|a| a.resindex >= residues.len()) {
            return Err(AnalysisError::InvalidTopology(format!(
                "atom {name} references residue {rix} but only {n} residues exist",
                name = atom.name,
                rix = atom.resindex,
                n = residues.len()
            )));
        }
        Ok(Self { atoms, residues })
    }

    /// Build a topology from the first model of a parsed structure file,
    /// returning the structure's coordinates as a reference [`Frame`].
    ///
    /// Residues are numbered globally in order of first appearance, keyed by
    /// (chain, residue number, insertion code).
    pub fn from_pdb(pdb: &PDB) -> Result<(Self, Frame), AnalysisError> {
        let first_model = pdb
            .models()
            .next()
            .map(|m| m.serial_number())
            .ok_or_else(|| AnalysisError::Structure("structure contains no models".to_string()))?;

        let mut atoms = Vec::new();
        let mut residues: Vec<ResidueInfo> = Vec::new();
        let mut positions = Vec::new();
        let mut residue_index: HashMap<(String, isize, String), usize> = HashMap::new();

        for hier in pdb.atoms_with_hierarchy() {
            if hier.model().serial_number() != first_model {
                continue;
            }
            let (resi, insertion) = hier.residue().id();
            let chain = hier.chain().id().to_string();
            let insertion = insertion.unwrap_or("").to_string();
            let resn = hier.residue().name().unwrap_or("").to_string();

            let key = (chain.clone(), resi, insertion.clone());
            let rix = match residue_index.get(&key) {
                Some(&rix) => rix,
                None => {
                    let rix = residues.len();
                    residue_index.insert(key, rix);
                    residues.push(ResidueInfo {
                        chain,
                        resi,
                        insertion,
                        resn,
                    });
                    rix
                }
            };

            let pos = hier.atom().pos();
            positions.push([pos.0, pos.1, pos.2]);
            atoms.push(Atom {
                name: hier.atom().name().to_string(),
                resindex: rix,
            });
        }

        debug!(
            "Built topology with {} atoms in {} residues",
            atoms.len(),
            residues.len()
        );
        let system = Self::new(atoms, residues)?;
        let frame = Frame::new(positions, None);
        Ok((system, frame))
    }

    /// Number of atoms in the topology.
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Number of residues in the topology.
    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    /// All atoms, in topology order.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// All residues, in global index order.
    pub fn residues(&self) -> &[ResidueInfo] {
        &self.residues
    }

    /// Annotations of the residue with the given global index.
    pub fn residue(&self, resindex: usize) -> &ResidueInfo {
        &self.residues[resindex]
    }

    /// Resolve a selection into an ordered atom group.
    pub fn select(&self, selection: &Selection) -> AtomGroup {
        let indices = self
            .atoms
            .iter()
            .enumerate()
            .filter(|(_, atom)| selection.matches(&self.residues[atom.resindex]))
            .map(|(i, _)| i)
            .collect();
        AtomGroup { indices }
    }
}

/// A typed atom selection, resolved against a [`System`].
///
/// Selections address whole residues; the resolved group contains every
/// atom of every matching residue, in topology order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Atoms of standard amino-acid residues.
    Protein,
    /// Atoms of everything that is not a standard amino-acid residue
    /// (solvent, ions, ligands, nucleic acids).
    NotProtein,
    /// Every atom in the system.
    All,
    /// Atoms of residues whose name is in the given list.
    Resnames(Vec<String>),
    /// Atoms of residues on the given chains.
    Chains(Vec<String>),
}

impl Selection {
    fn matches(&self, residue: &ResidueInfo) -> bool {
        match self {
            Selection::Protein => is_amino_acid(&residue.resn),
            Selection::NotProtein => !is_amino_acid(&residue.resn),
            Selection::All => true,
            Selection::Resnames(names) => names.iter().any(|n| n == &residue.resn),
            Selection::Chains(chains) => chains.iter().any(|c| c == &residue.chain),
        }
    }
}

/// An ordered, immutable set of atom indices resolved from a [`Selection`].
#[derive(Debug, Clone)]
pub struct AtomGroup {
    indices: Vec<usize>,
}

impl AtomGroup {
    /// Atom indices into the system, in topology order.
    pub fn atom_indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of atoms in the group.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the group is empty.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Global indices of the group's parent residues, deduplicated in order
    /// of first appearance.
    pub fn parent_residues(&self, system: &System) -> Vec<usize> {
        let mut seen = vec![false; system.residue_count()];
        let mut residues = Vec::new();
        for &i in &self.indices {
            let rix = system.atoms()[i].resindex;
            if !seen[rix] {
                seen[rix] = true;
                residues.push(rix);
            }
        }
        residues
    }
}

/// The residue attribute used to aggregate partner residues into matrix
/// columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBy {
    /// Group by residue name (e.g. all "SOL" residues share a column).
    #[default]
    ResidueName,
    /// Group by chain identifier.
    Chain,
    /// Group by residue sequence number; every residue gets its own column
    /// unless numbers repeat across chains.
    ResidueId,
}

impl GroupBy {
    /// The category value of a residue under this grouping.
    pub fn value(&self, residue: &ResidueInfo) -> String {
        match self {
            GroupBy::ResidueName => residue.resn.clone(),
            GroupBy::Chain => residue.chain.clone(),
            GroupBy::ResidueId => residue.resi.to_string(),
        }
    }
}

/// Check if a residue name is one of the twenty standard amino acids.
pub fn is_amino_acid(resn: &str) -> bool {
    matches!(
        resn.to_uppercase().as_str(),
        "ALA"
            | "ARG"
            | "ASN"
            | "ASP"
            | "CYS"
            | "GLN"
            | "GLU"
            | "GLY"
            | "HIS"
            | "ILE"
            | "LEU"
            | "LYS"
            | "MET"
            | "PHE"
            | "PRO"
            | "SER"
            | "THR"
            | "TRP"
            | "TYR"
            | "VAL"
    )
}
