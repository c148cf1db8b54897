// Fluid batches and the capillary seal strength model they feed

use serde::{Deserialize, Serialize};

/// Gas-to-oil ratio reported when there is no oil.
pub const GORM_WITHOUT_OIL: f64 = 1.0e80;

/// A batch of fluid as seen by the distribution.
///
/// The distribution reads densities and volumes, and derives the escaped and
/// remaining batches by cloning the input and overwriting its volume.
pub trait Composition: Clone {
    fn density(&self) -> f64;

    fn volume(&self) -> f64;

    fn set_volume(&mut self, volume: f64);

    fn weight(&self) -> f64;

    fn is_empty(&self) -> bool {
        self.volume() <= 0.0
    }

    /// A copy of this batch holding `volume`.
    fn with_volume(&self, volume: f64) -> Self {
        let mut batch = self.clone();
        batch.set_volume(volume);
        batch
    }
}

/// Homogeneous fluid batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FluidBatch {
    density: f64,
    volume: f64,
    weight: f64,
}

impl FluidBatch {
    pub fn new(density: f64, volume: f64) -> Self {
        FluidBatch {
            density,
            volume,
            weight: density * volume,
        }
    }

    pub fn empty(density: f64) -> Self {
        FluidBatch::new(density, 0.0)
    }
}

impl Composition for FluidBatch {
    fn density(&self) -> f64 {
        self.density
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    /// The weight follows the volume so the density is preserved.
    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
        self.weight = self.density * volume;
    }

    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Gas-to-oil mass ratio of the two phases in a trap.
pub fn compute_gorm<C: Composition>(gas: &C, oil: &C) -> f64 {
    if oil.weight() > 0.0 {
        gas.weight() / oil.weight()
    } else {
        GORM_WITHOUT_OIL
    }
}

/// Capillary entry pressures of the seal with respect to brine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapillaryStrengths {
    pub gas: f64,
    pub oil: f64,
}

impl CapillaryStrengths {
    pub const UNBOUNDED: CapillaryStrengths = CapillaryStrengths {
        gas: f64::INFINITY,
        oil: f64::INFINITY,
    };
}

impl Default for CapillaryStrengths {
    fn default() -> Self {
        CapillaryStrengths::UNBOUNDED
    }
}

/// Capillary seal strength of the seal above a trap.
///
/// The petrophysical model behind it lives outside this crate; the
/// distribution only needs it as a function of the trapped fluids.
pub trait CapillarySealStrength {
    /// # Arguments
    /// * trap_composition: gas and oil in the trap, in that order
    /// * gorm: gas-to-oil mass ratio
    /// * temperature_k: temperature in K
    /// * brine_pressure: pressure of the brine in the seal
    fn compute<C: Composition>(
        &self,
        trap_composition: [&C; 2],
        gorm: f64,
        temperature_k: f64,
        brine_pressure: f64,
    ) -> CapillaryStrengths;
}

/// Capillary seal strengths that do not depend on the fluids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedCapillarySealStrength(pub CapillaryStrengths);

impl CapillarySealStrength for FixedCapillarySealStrength {
    fn compute<C: Composition>(&self, _: [&C; 2], _: f64, _: f64, _: f64) -> CapillaryStrengths {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_volume_preserves_density() {
        let mut oil = FluidBatch::new(800.0, 10.0);
        assert_eq!(oil.weight(), 8000.0);
        oil.set_volume(2.5);
        assert_eq!(oil.weight(), 2000.0);
        assert_eq!(oil.density(), 800.0);

        let copy = oil.with_volume(0.0);
        assert!(copy.is_empty());
        assert_eq!(oil.volume(), 2.5);
    }

    #[test]
    fn gorm_of_gas_and_oil() {
        let gas = FluidBatch::new(200.0, 10.0);
        let oil = FluidBatch::new(800.0, 10.0);
        assert_eq!(compute_gorm(&gas, &oil), 0.25);
        assert_eq!(compute_gorm(&gas, &FluidBatch::empty(800.0)), GORM_WITHOUT_OIL);
    }

    #[test]
    fn fixed_strengths_ignore_the_fluids() {
        let strengths = CapillaryStrengths { gas: 1.0e5, oil: 2.0e5 };
        let model = FixedCapillarySealStrength(strengths);
        let gas = FluidBatch::new(200.0, 1.0);
        let oil = FluidBatch::new(800.0, 1.0);
        assert_eq!(model.compute([&gas, &oil], 0.25, 350.0, 2.0e7), strengths);
        assert_eq!(FixedCapillarySealStrength::default().0, CapillaryStrengths::UNBOUNDED);
    }
}
