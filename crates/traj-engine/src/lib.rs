#![forbid(unsafe_code)]

pub mod acf;
pub mod analysis;
pub mod decorrelate;
pub mod gyration;
pub mod msd;
pub mod pacf;
pub mod pdf;
pub mod thermo;

pub use acf::acf;
pub use analysis::Analysis;
pub use decorrelate::{DecorrelateOutput, DecorrelatePlan};
pub use gyration::{GyrationGroups, GyrationOutput, GyrationPlan, GyrationTensor};
pub use msd::{MsdOutput, MsdPlan};
pub use pacf::{PacfOutput, PacfPlan};
pub use pdf::{PdfOutput, PdfPlan};
pub use thermo::{Stat, ThermoPlan, ThermoSummary};
