//! Application-level orchestration of cppp runs.
//!
//! This module owns the run lifecycle (start/stop), the supervision of the child
//! process, and the fan-in of its output. UI/CLI layers talk to it only through
//! `UiCommand`s in and `ControllerEvent`s out.

mod controller;
mod multiplex;
mod supervisor;
mod terminate;

pub(crate) use controller::{run_controller, ControllerConfig, UiCommand};
