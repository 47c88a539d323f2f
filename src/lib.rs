//! KPI computation and filtering for the water, sanitation and budget
//! dashboard. The `water-dash` binary is a thin egui shell over this crate.

pub mod config;
pub mod data;
pub mod nav;
