pub mod deployer;
pub mod karma;
pub mod mapper;

pub use deployer::{DeployerRecord, DeployerWhitelist};
pub use karma::KarmaLedger;
pub use mapper::IdentityMapper;
