//! Node shell around the admission pipeline: configuration, logging,
//! genesis seeding and the service surface a consensus engine drives.

pub mod config;
pub mod genesis;
pub mod logging;
pub mod service;

pub use config::{ChainSection, LogSection, NodeConfig};
pub use genesis::{GenesisDeployer, GenesisDoc, GenesisKarma, GenesisMapping};
pub use service::{build_pipeline, AdmissionService};
