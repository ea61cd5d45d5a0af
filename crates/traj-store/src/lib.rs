#![forbid(unsafe_code)]

pub mod cell;
pub mod config;
pub mod elements;
pub mod error;
pub mod geom;
pub mod geometry;
pub mod merge;
pub mod snapshot;
pub mod steps;
pub mod symmetry;
pub mod trajectory;

pub use cell::{fold_reduced, nearest_image, Cell};
pub use config::{
    DecorrelateConfig, EngineConfig, LoaderConfig, PdfConfig, ReorderConfig,
};
pub use error::{TrajError, TrajResult};
pub use geom::{angle_from_vectors, center_of_geometry, Vec3};
pub use geometry::{angle, distance, scale_cell, wrap, wrap_all};
pub use merge::reorder;
pub use snapshot::{Snapshot, Species};
pub use steps::StepAccess;
pub use symmetry::{SpaceGroup, SymmetryFinder};
pub use trajectory::{TimeWindow, Trajectory};
