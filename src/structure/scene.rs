//! Scene construction
//!
//! Turns a validated [`StructureDocument`] into a flat list of placed meshes
//! plus the initial camera and root rotation. Rendering itself is out of
//! scope; the output is backend-neutral.
//!
//! Transform conventions, matching the document format:
//! - `ellipsoid_rotation` and bond `rotation` are row-major 3x3 matrices.
//! - A `Uani` atom applies the TRANSPOSE of its rotation to a unit sphere
//!   scaled by [`ADP_SCALE`]; a bond applies its rotation as-is to a unit
//!   cylinder whose y-scale is the bond length.
//! - The root rotation is an axis-angle turn about the normalised initial
//!   camera direction.

use glam::{Mat3, Mat4, Quat, Vec3};

use super::{AdpDisplayType, StructureDocument};

/// Uniform scale applied to anisotropic displacement ellipsoids
pub const ADP_SCALE: f32 = 1.5382;

/// Radius of the unit bond cylinder (height 1 along y)
pub const BOND_RADIUS: f32 = 0.04;

/// Ring markers sit just outside the unit sphere
pub const MARKER_RADIUS: f32 = 1.01;

/// Height of the ring marker band along its axis
pub const MARKER_HEIGHT: f32 = 0.2;

/// Colour of every bond cylinder
pub const BOND_COLOUR: &str = "#444444";

const QUARTER_TURN: f32 = std::f32::consts::FRAC_PI_2;

/// What geometry a node places
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshKind {
    /// Unit sphere
    Sphere,
    /// Open cylinder band of radius [`MARKER_RADIUS`] and height
    /// [`MARKER_HEIGHT`], axis along y
    RingMarker,
    /// Cylinder of radius [`BOND_RADIUS`] and height 1 along y
    BondCylinder,
}

/// One placed mesh
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub kind: MeshKind,
    pub colour: String,
    pub transform: Mat4,
}

/// Placed meshes plus the initial view
#[derive(Debug, Clone)]
pub struct Scene {
    pub camera_position: Vec3,
    pub root_rotation: Quat,
    pub nodes: Vec<SceneNode>,
}

/// Interpret nine values as a row-major 3x3 matrix
fn row_major(values: &[f32; 9]) -> Mat3 {
    // from_cols_array reads column-major, so transposing recovers the
    // row-major interpretation
    Mat3::from_cols_array(values).transpose()
}

fn placed(kind: MeshKind, colour: &str, transform: Mat4) -> SceneNode {
    SceneNode {
        kind,
        colour: colour.to_string(),
        transform,
    }
}

/// Build the scene for a validated document.
///
/// Each atom contributes one sphere; `Uani` atoms additionally contribute
/// three ring markers in mutually perpendicular planes. Each bond contributes
/// one cylinder. Node order is atoms first (document order, rings directly
/// after their sphere), then bonds.
pub fn build_scene(document: &StructureDocument) -> Scene {
    let camera_position = Vec3::from_array(document.default.camera_position0);
    let root_rotation = Quat::from_axis_angle(
        camera_position.normalize_or(Vec3::Z),
        document.default.structure_rotation0,
    );

    let mut nodes = Vec::new();

    for atom in &document.atoms {
        let position = Mat4::from_translation(Vec3::from_array(atom.cartn_xyz));

        match atom.adp_display_type {
            AdpDisplayType::Uani => {
                // Validation guarantees these fields for Uani atoms
                let rotation = atom
                    .ellipsoid_rotation
                    .as_ref()
                    .map(row_major)
                    .unwrap_or(Mat3::IDENTITY);
                let ring_colour = atom.ring_colour.as_deref().unwrap_or(&atom.atom_colour);

                let ellipsoid =
                    position * Mat4::from_mat3(rotation.transpose()) * Mat4::from_scale(Vec3::splat(ADP_SCALE));
                nodes.push(placed(MeshKind::Sphere, &atom.atom_colour, ellipsoid));

                // Three bands with mutually perpendicular axes: y as-is,
                // then quarter turns about x and z
                for pre in [
                    Mat4::IDENTITY,
                    Mat4::from_rotation_x(QUARTER_TURN),
                    Mat4::from_rotation_z(QUARTER_TURN),
                ] {
                    nodes.push(placed(MeshKind::RingMarker, ring_colour, ellipsoid * pre));
                }
            }
            AdpDisplayType::Constant => {
                let size = atom.size.unwrap_or(1.0);
                let transform = position * Mat4::from_scale(Vec3::splat(size));
                nodes.push(placed(MeshKind::Sphere, &atom.atom_colour, transform));
            }
        }
    }

    for bond in &document.bonds {
        let transform = Mat4::from_translation(Vec3::from_array(bond.centre))
            * Mat4::from_mat3(row_major(&bond.rotation))
            * Mat4::from_scale(Vec3::new(1.0, bond.length, 1.0));
        nodes.push(placed(MeshKind::BondCylinder, BOND_COLOUR, transform));
    }

    Scene {
        camera_position,
        root_rotation,
        nodes,
    }
}
