// library

pub mod buoyancy;
pub mod composition;
pub mod distributor;
pub mod error;
pub mod escape;
pub mod level_volume;
pub mod selector;
pub mod two_phase;

#[cfg(feature = "python")]
mod python;

pub use composition::{
    CapillarySealStrength, CapillaryStrengths, Composition, FixedCapillarySealStrength, FluidBatch,
};
pub use distributor::{
    Distribution, DistributionCase, Distributor, DistributorConfig, LeakAllGasAndOilDistributor,
    LeakWasteAndSpillDistributor, Phase, PhaseDistribution, SpillAllGasAndOilDistributor,
    TrapDistributor,
};
pub use error::DistributionError;
pub use escape::{Escape, Escaped, Leak, Spill, Waste};
pub use level_volume::{Content, LevelVolumeMap};
