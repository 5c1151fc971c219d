//! Unit test harness for cnc-motion.
//!
//! Configuration tests, plus property tests that drive the planner and
//! the stepper pipeline with generated paths.

mod config_parsing;
mod config_validation;
mod planner_properties;
mod stepper_properties;
