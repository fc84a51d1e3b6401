//! HTTP handlers for the FLUPSY Management Platform

pub mod analytics;
pub mod baskets;
pub mod cycles;
pub mod flupsys;
pub mod health;
pub mod lots;
pub mod operations;
pub mod screenings;
pub mod sizes;

pub use analytics::*;
pub use baskets::*;
pub use cycles::*;
pub use flupsys::*;
pub use health::*;
pub use lots::*;
pub use operations::*;
pub use screenings::*;
pub use sizes::*;
