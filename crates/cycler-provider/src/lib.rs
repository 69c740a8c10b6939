//! cycler-provider: the cloud APIs Cloud Cycler drives.
//!
//! The engine never talks to a vendor SDK directly. It consumes four
//! narrow, synchronous request/response traits:
//!
//! ```text
//! ComputeApi   list / describe / start / stop / terminate instances
//! ScalingApi   describe groups, suspend / resume processes, resize,
//!              load balancer (de)registration
//! StackApi     list / describe stacks, template, resources, create, delete
//! DatabaseApi  list and create database snapshots
//! ```
//!
//! [`SimulatedCloud`] implements all four in memory. Tests use it as a
//! fake and the CLI uses it to run against a fleet description on disk.

pub mod api;
pub mod error;
pub mod sim;
pub mod types;

pub use api::{Clients, ComputeApi, DatabaseApi, ScalingApi, StackApi};
pub use error::{ProviderError, ProviderResult};
pub use sim::{Fleet, ProviderCall, SimulatedCloud};
pub use types::*;
