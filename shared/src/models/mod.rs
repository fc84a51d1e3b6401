//! Domain models for the FLUPSY Management Platform

mod basket;
mod composition;
mod cycle;
mod flupsy;
mod lot;
mod operation;
mod screening;
mod size;

pub use basket::*;
pub use composition::*;
pub use cycle::*;
pub use flupsy::*;
pub use lot::*;
pub use operation::*;
pub use screening::*;
pub use size::*;
