//! Business logic services for the FLUPSY Management Platform

pub mod analytics;
pub mod basket;
pub mod cycle;
pub mod flupsy;
pub mod lot;
pub mod operation;
pub mod screening;
pub mod size;

pub use analytics::AnalyticsService;
pub use basket::BasketService;
pub use cycle::CycleService;
pub use flupsy::FlupsyService;
pub use lot::LotService;
pub use operation::OperationService;
pub use screening::ScreeningService;
pub use size::SizeService;
