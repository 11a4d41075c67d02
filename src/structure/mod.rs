//! Crystal structure document
//!
//! Schema and validation for `structure.json`: a palette of colours, a list
//! of atoms (drawn either as anisotropic displacement ellipsoids or as
//! fixed-size spheres), the bonds between them, and the initial view. The
//! document is validated up front; a `Uani` atom without its rotation matrix
//! is an error here, not a crash in whatever consumes the scene.

pub mod scene;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use scene::{build_scene, MeshKind, Scene, SceneNode};

/// Structure document errors
#[derive(Debug, thiserror::Error)]
pub enum StructureError {
    #[error("Cannot read structure file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse structure JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Atom {index}: {problem}")]
    Atom { index: usize, problem: String },

    #[error("Bond {index}: {problem}")]
    Bond { index: usize, problem: String },

    #[error("Colour {colour:?} used by atom {index} is not in the palette")]
    UnknownColour { index: usize, colour: String },
}

/// How an atom's displacement is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdpDisplayType {
    /// Anisotropic ellipsoid with ring markers; requires `ellipsoid_rotation`
    /// and `ring_colour`
    Uani,
    /// Fixed-size sphere; requires `size`
    #[serde(rename = "constant")]
    Constant,
}

/// Initial camera and root-rotation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDefaults {
    pub camera_position0: [f32; 3],
    pub structure_rotation0: f32,
}

/// One atom site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    pub atom_colour: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring_colour: Option<String>,
    pub adp_display_type: AdpDisplayType,
    #[serde(rename = "Cartn_xyz")]
    pub cartn_xyz: [f32; 3],
    /// Row-major 3x3 rotation, present for `Uani` atoms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ellipsoid_rotation: Option<[f32; 9]>,
    /// Sphere radius, present for `constant` atoms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
}

/// One bond between two atom sites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bond {
    pub length: f32,
    /// Row-major 3x3 rotation aligning the cylinder axis
    pub rotation: [f32; 9],
    pub centre: [f32; 3],
}

/// Full structure document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureDocument {
    pub default: ViewDefaults,
    pub colours: Vec<String>,
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
}

impl StructureDocument {
    /// Parse from JSON text and validate
    pub fn from_json(text: &str) -> Result<Self, StructureError> {
        let document: StructureDocument = serde_json::from_str(text)?;
        document.validate()?;
        Ok(document)
    }

    /// Load from a file and validate
    pub fn from_file(path: &Path) -> Result<Self, StructureError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check cross-field requirements the schema alone cannot express
    pub fn validate(&self) -> Result<(), StructureError> {
        for (index, atom) in self.atoms.iter().enumerate() {
            match atom.adp_display_type {
                AdpDisplayType::Uani => {
                    if atom.ellipsoid_rotation.is_none() {
                        return Err(StructureError::Atom {
                            index,
                            problem: "Uani atom is missing ellipsoid_rotation".to_string(),
                        });
                    }
                    if atom.ring_colour.is_none() {
                        return Err(StructureError::Atom {
                            index,
                            problem: "Uani atom is missing ring_colour".to_string(),
                        });
                    }
                }
                AdpDisplayType::Constant => {
                    if atom.size.is_none() {
                        return Err(StructureError::Atom {
                            index,
                            problem: "constant atom is missing size".to_string(),
                        });
                    }
                }
            }

            self.check_colour(index, &atom.atom_colour)?;
            if let Some(ref ring_colour) = atom.ring_colour {
                self.check_colour(index, ring_colour)?;
            }
        }

        for (index, bond) in self.bonds.iter().enumerate() {
            if bond.length <= 0.0 || !bond.length.is_finite() {
                return Err(StructureError::Bond {
                    index,
                    problem: format!("length must be finite and positive, got {}", bond.length),
                });
            }
        }

        Ok(())
    }

    fn check_colour(&self, index: usize, colour: &str) -> Result<(), StructureError> {
        if self.colours.iter().any(|c| c == colour) {
            Ok(())
        } else {
            Err(StructureError::UnknownColour {
                index,
                colour: colour.to_string(),
            })
        }
    }
}
