#![warn(missing_docs)]

//! Diffractometer inverse kinematics.
//!
//! A diffractometer is a chain of rotation axes carrying a crystal and a
//! detector. This crate maps between the axis positions and physically
//! meaningful coordinates called pseudo-axes (Miller indices, scattering
//! vector norm, azimuth, surface angles) in both directions:
//!
//! - `get` computes the pseudo-axes of the current geometry in closed form;
//! - `set` solves for every axis position realizing requested pseudo-axes
//!   under the constraints of the selected mode, and returns the solutions
//!   sorted by distance to the current geometry.
//!
//! # Features
//!
//! - Geometries built from holders of rotation/translation axes
//! - Lattices, samples and UB computation from two reflections
//! - Engines: hkl, q, q2, psi, incidence, emergence, eulerians
//! - Built-in E4CV, E4CH, K4CV, E6C, K6C and ZAXIS diffractometers
//! - Sessions described in TOML
//!
//! # Example
//!
//! ```
//! use hkl_kernel::{Lattice, Registry, Sample, SolverConfig};
//!
//! let sample = Sample::new("cubic", Lattice::cubic(1.54).unwrap());
//! let mut list = Registry::builtin()
//!     .get("E4CV")
//!     .unwrap()
//!     .engine_list(sample, SolverConfig::default())
//!     .unwrap();
//! list.geometry_mut()
//!     .set_axis_values_in_user_unit(&[30.0, 0.0, 0.0, 60.0])
//!     .unwrap();
//!
//! let solutions = list.set("hkl", &[0.0, 0.0, 1.0]).unwrap();
//! let best = solutions.get(0).unwrap();
//! assert!((best.axis("tth").unwrap().value() - 60f64.to_radians()).abs() < 1e-6);
//! ```

mod axis;
pub mod config;
mod detector;
pub mod engine;
pub mod error;
pub mod factory;
mod geometry;
mod geometry_list;
mod holder;
pub mod kappa;
mod kinematics;
mod lattice;
mod mode;
mod parameter;
mod sample;
mod source;

pub use axis::{Axis, AxisKind};
pub use config::SessionConfig;
pub use detector::{Detector, DetectorKind};
pub use engine::{Engine, EngineKind, EngineList};
pub use error::{HklError, Result};
pub use factory::{Factory, Registry};
pub use geometry::{AxisValue, Geometry, GeometryBuilder, GeometrySnapshot};
pub use geometry_list::GeometryList;
pub use holder::Holder;
pub use lattice::Lattice;
pub use mode::{Constraint, EulerianAngle, Mode};
pub use parameter::{Parameter, Unit};
pub use sample::{Reflection, Sample};
pub use source::{Source, DEFAULT_WAVELENGTH};

pub use hkl_math::{Mat3, Vec3};
pub use hkl_solver::{SolveStats, SolverConfig};
