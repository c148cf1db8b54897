// Single fluid leaking, spilling and wasting

use serde::{Deserialize, Serialize};

use crate::level_volume::LevelVolumeMap;

/// Gravitational acceleration in m/s^2.
pub const GRAVITY: f64 = 9.81;

/// `true` when a seal strength or level stands for "never reached".
///
/// Strengths that were never computed are reported as `f64::MAX`, so that
/// value counts as unbounded just like infinity.
pub fn is_unbounded(value: f64) -> bool {
    value >= f64::MAX || value.is_nan()
}

/// Buoyancy pressure per unit of column height
///
/// $$F = g \left(\rho_s - \rho_f\right) + \frac{\Delta p}{h_c}$$
///
/// The overpressure term is dropped when the crest column thickness is zero.
///
/// # Arguments
/// * fluid_density: density of the buoyant fluid in kg/m^3
/// * seal_fluid_density: density of the fluid in the seal in kg/m^3
/// * over_pressure_contrast: pore pressure contrast across the seal in Pa
/// * crest_column_thickness: thickness of the crest column in m
pub fn buoyancy_force(
    fluid_density: f64,
    seal_fluid_density: f64,
    over_pressure_contrast: f64,
    crest_column_thickness: f64,
) -> f64 {
    let force = GRAVITY * (seal_fluid_density - fluid_density);
    if crest_column_thickness != 0.0 {
        force + over_pressure_contrast / crest_column_thickness
    } else {
        force
    }
}

/// Volumes of one fluid that left the trap, per escape mechanism.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Escaped {
    pub leaked: f64,
    pub wasted: f64,
    pub spilled: f64,
}

impl Escaped {
    pub fn leaked(leaked: f64) -> Self {
        Escaped {
            leaked,
            ..Default::default()
        }
    }

    pub fn wasted(wasted: f64) -> Self {
        Escaped {
            wasted,
            ..Default::default()
        }
    }

    pub fn spilled(spilled: f64) -> Self {
        Escaped {
            spilled,
            ..Default::default()
        }
    }

    pub fn total(&self) -> f64 {
        self.leaked + self.wasted + self.spilled
    }

    /// Round escaped volumes that came out marginally negative up to zero.
    pub fn non_negative(self) -> Self {
        Escaped {
            leaked: self.leaked.max(0.0),
            wasted: self.wasted.max(0.0),
            spilled: self.spilled.max(0.0),
        }
    }
}

/// A mechanism through which a single fluid escapes once its column
/// exceeds a maximum level.
pub trait Escape {
    /// Highest level the fluid column may reach.
    fn max_level(&self) -> f64;

    /// Volume stored up to [`max_level`](Self::max_level).
    fn max_volume(&self) -> f64;

    /// Volume of `fluid_volume` that escapes.
    fn distribute(&self, fluid_volume: f64) -> f64 {
        (fluid_volume - self.max_volume()).max(0.0)
    }
}

/// Escape over the spill point, i.e. beyond the capacity of the trap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spill {
    max_level: f64,
    max_volume: f64,
}

impl Spill {
    pub fn new(level_to_volume: &LevelVolumeMap) -> Self {
        Spill {
            max_level: level_to_volume.invert(f64::INFINITY),
            max_volume: level_to_volume.apply(f64::INFINITY),
        }
    }
}

impl Escape for Spill {
    fn max_level(&self) -> f64 {
        self.max_level
    }

    fn max_volume(&self) -> f64 {
        self.max_volume
    }
}

/// Escape through an externally imposed ceiling such as a surface vent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waste {
    max_level: f64,
    max_volume: f64,
}

impl Waste {
    pub fn new(waste_level: f64, level_to_volume: &LevelVolumeMap) -> Self {
        Waste {
            max_level: waste_level,
            max_volume: level_to_volume.apply(waste_level),
        }
    }
}

impl Escape for Waste {
    fn max_level(&self) -> f64 {
        self.max_level
    }

    fn max_volume(&self) -> f64 {
        self.max_volume
    }
}

/// Escape through the top seal once the buoyancy pressure of the column
/// exceeds the seal strength.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Leak {
    fluid_density: f64,
    seal_fluid_density: f64,
    max_seal_pressure: f64,
    max_level: f64,
    max_volume: f64,
}

impl Leak {
    /// # Arguments
    /// * fluid_density: density of the leaking fluid, clamped to the seal fluid density
    /// * seal_fluid_density: density of the fluid in the seal
    /// * over_pressure_contrast: pore pressure contrast across the seal
    /// * crest_column_thickness: thickness of the crest column
    /// * max_seal_pressure: pressure at which the seal fails
    /// * level_to_volume: the trap's level-to-volume function
    pub fn new(
        fluid_density: f64,
        seal_fluid_density: f64,
        over_pressure_contrast: f64,
        crest_column_thickness: f64,
        max_seal_pressure: f64,
        level_to_volume: &LevelVolumeMap,
    ) -> Self {
        // A fluid heavier than the seal fluid would have negative buoyancy;
        // treat it as neutrally buoyant so that it never leaks.
        let fluid_density = fluid_density.min(seal_fluid_density);
        let force = buoyancy_force(
            fluid_density,
            seal_fluid_density,
            over_pressure_contrast,
            crest_column_thickness,
        );

        let mut max_level = f64::INFINITY;
        if force != 0.0 && !is_unbounded(max_seal_pressure) {
            let level = max_seal_pressure / force;
            if level.is_finite() && level >= 0.0 {
                max_level = level;
            }
        }

        Leak {
            fluid_density,
            seal_fluid_density,
            max_seal_pressure,
            max_level,
            max_volume: level_to_volume.apply(max_level),
        }
    }

    pub fn fluid_density(&self) -> f64 {
        self.fluid_density
    }

    pub fn seal_fluid_density(&self) -> f64 {
        self.seal_fluid_density
    }

    pub fn max_seal_pressure(&self) -> f64 {
        self.max_seal_pressure
    }
}

impl Escape for Leak {
    fn max_level(&self) -> f64 {
        self.max_level
    }

    fn max_volume(&self) -> f64 {
        self.max_volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn trap() -> LevelVolumeMap {
        LevelVolumeMap::new(vec![(0.0, 0.0), (2.0, 50.0), (4.0, 150.0)]).unwrap()
    }

    #[test]
    fn buoyancy_force_drops_overpressure_without_thickness() {
        assert_abs_diff_eq!(buoyancy_force(800.0, 1073.0, 0.2, 2.0), 2678.23, epsilon = 1e-9);
        assert_abs_diff_eq!(buoyancy_force(800.0, 1073.0, 0.2, 0.0), 2678.13, epsilon = 1e-9);
    }

    #[test]
    fn leak_above_threshold() {
        let leak = Leak::new(800.0, 1073.0, 0.2, 2.0, 10000.0, &trap());
        assert_abs_diff_eq!(leak.max_level(), 10000.0 / 2678.23, epsilon = 1e-12);
        assert_abs_diff_eq!(leak.distribute(1000.0), 863.3095365225, epsilon = 1e-8);
    }

    #[test]
    fn leak_below_threshold() {
        let leak = Leak::new(800.0, 1073.0, 0.2, 2.0, 10000.0, &trap());
        assert_abs_diff_eq!(leak.distribute(100.0), 0.0);
    }

    #[test]
    fn equal_densities_leak_only_beyond_capacity() {
        let leak = Leak::new(1000.0, 1000.0, 0.2, 2.0, 10000.0, &trap());
        assert_abs_diff_eq!(leak.distribute(200.0), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn heavy_fluid_is_clamped_and_never_leaks() {
        let leak = Leak::new(1200.0, 1073.0, 0.0, 0.0, 10000.0, &trap());
        assert_eq!(leak.fluid_density(), 1073.0);
        assert!(leak.max_level().is_infinite());
        assert_abs_diff_eq!(leak.max_volume(), 150.0);
    }

    #[test]
    fn unbounded_seal_never_leaks() {
        let leak = Leak::new(800.0, 1073.0, 0.0, 0.0, f64::MAX, &trap());
        assert!(leak.max_level().is_infinite());
        assert!(is_unbounded(f64::INFINITY));
        assert!(!is_unbounded(1.0e300));
    }

    #[test]
    fn spill_at_capacity() {
        let spill = Spill::new(&trap());
        assert_eq!(spill.max_level(), 4.0);
        assert_eq!(spill.distribute(150.0), 0.0);
        assert_eq!(spill.distribute(100.0), 0.0);
        assert_abs_diff_eq!(spill.distribute(180.0), 30.0);
    }

    #[test]
    fn waste_at_given_level() {
        let waste = Waste::new(3.0, &trap());
        assert_eq!(waste.max_level(), 3.0);
        assert_abs_diff_eq!(waste.max_volume(), 100.0);
        assert_abs_diff_eq!(waste.distribute(120.0), 20.0);
        assert_eq!(waste.distribute(80.0), 0.0);
    }
}
