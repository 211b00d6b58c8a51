//! Concrete adapter implementations.
//!
//! Each module implements the [`LandValueSource`](crate::LandValueSource)
//! trait. Official services share the config-driven [`ogc::OgcSource`];
//! the remaining modules cover estimates, manual lookups and composition.

pub mod chained;
pub mod estimator;
pub mod manual;
pub mod ogc;
