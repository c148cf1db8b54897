// Distribution of gas and oil present together in a trap

use log::trace;
use serde::{Deserialize, Serialize};

use crate::buoyancy::{
    oil_to_gas_level_ratio, solve_capacity_gas_content, solve_final_gas_content,
    solve_plateau_gas_content, CapacityMaxBuoyancyGasLevel, FixedOilMaxBuoyancyGasLevel,
    LimitedFixedOilMaxBuoyancyHcLevel,
};
use crate::error::DistributionError;
use crate::escape::{Escape, Escaped, Leak, Spill, Waste};
use crate::level_volume::{Content, LevelVolumeMap, SegmentQuery};
use crate::selector::LeakOrSpill;

/// Escaped gas and oil volumes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TwoPhaseOutcome {
    pub gas: Escaped,
    pub oil: Escaped,
}

impl TwoPhaseOutcome {
    pub(crate) fn non_negative(self) -> Self {
        TwoPhaseOutcome {
            gas: self.gas.non_negative(),
            oil: self.oil.non_negative(),
        }
    }
}

fn locate<Q: SegmentQuery>(
    level_to_volume: &LevelVolumeMap,
    query: &Q,
    what: &'static str,
) -> Result<usize, DistributionError> {
    let index = level_to_volume
        .find_segment_index(query)
        .index()
        .ok_or(DistributionError::SegmentOutOfRange { what })?;
    trace!("{} located on segment {}", what, index);
    Ok(index)
}

fn validate_density(name: &'static str, value: f64) -> Result<(), DistributionError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(DistributionError::InvalidDensity { name, value })
    }
}

/// Leaking of gas topping an oil column.
///
/// The oil column adds to the buoyancy of the gas column, so gas leaks
/// earlier than it would on its own. Oil only leaks once its buoyancy alone
/// breaks the seal for gas, in which case all gas is gone already.
#[derive(Clone, Copy, Debug)]
pub struct TwoPhaseLeak<'m> {
    level_to_volume: &'m LevelVolumeMap,
    leak_gas: Leak,
    leak_oil: Leak,
    oil_to_gas_level_ratio: f64,
}

impl<'m> TwoPhaseLeak<'m> {
    /// # Arguments
    /// * gas_density: density of gas
    /// * oil_density: density of oil
    /// * seal_fluid_density: density of the fluid in the seal
    /// * over_pressure_contrast: pore pressure contrast across the seal
    /// * crest_column_thickness: thickness of the crest column
    /// * fracture_pressure: fracture strength of the seal
    /// * cap_pressure_gas: capillary entry pressure of the seal for gas
    /// * cap_pressure_oil: capillary entry pressure of the seal for oil
    /// * level_to_volume: the trap's level-to-volume function, with `map(0) = 0`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gas_density: f64,
        oil_density: f64,
        seal_fluid_density: f64,
        over_pressure_contrast: f64,
        crest_column_thickness: f64,
        fracture_pressure: f64,
        cap_pressure_gas: f64,
        cap_pressure_oil: f64,
        level_to_volume: &'m LevelVolumeMap,
    ) -> Result<Self, DistributionError> {
        validate_density("gas", gas_density)?;
        validate_density("oil", oil_density)?;
        validate_density("seal fluid", seal_fluid_density)?;

        let leak_gas = Leak::new(
            gas_density,
            seal_fluid_density,
            over_pressure_contrast,
            crest_column_thickness,
            fracture_pressure.min(cap_pressure_gas),
            level_to_volume,
        );
        let leak_oil = Leak::new(
            oil_density,
            seal_fluid_density,
            over_pressure_contrast,
            crest_column_thickness,
            fracture_pressure.min(cap_pressure_oil),
            level_to_volume,
        );

        // Densities above the seal fluid density are clamped by Leak, so the
        // ratio is computed from the clamped ones.
        let oil_to_gas_level_ratio = oil_to_gas_level_ratio(
            leak_gas.fluid_density(),
            leak_oil.fluid_density(),
            seal_fluid_density,
        )?;

        Ok(TwoPhaseLeak {
            level_to_volume,
            leak_gas,
            leak_oil,
            oil_to_gas_level_ratio,
        })
    }

    pub fn leak_gas(&self) -> &Leak {
        &self.leak_gas
    }

    pub fn leak_oil(&self) -> &Leak {
        &self.leak_oil
    }

    pub fn oil_to_gas_level_ratio(&self) -> f64 {
        self.oil_to_gas_level_ratio
    }

    pub fn level_to_volume(&self) -> &'m LevelVolumeMap {
        self.level_to_volume
    }

    pub(crate) fn max_gas_level_query(&self, oil_volume: f64) -> FixedOilMaxBuoyancyGasLevel<'m> {
        FixedOilMaxBuoyancyGasLevel::new(
            self.leak_gas.max_level(),
            self.oil_to_gas_level_ratio,
            oil_volume,
            self.level_to_volume,
        )
    }

    /// Leaked gas and oil volumes.
    pub fn distribute(
        &self,
        gas_volume: f64,
        oil_volume: f64,
    ) -> Result<TwoPhaseOutcome, DistributionError> {
        let max_gas_level = self.max_gas_level_query(oil_volume);

        // Oil buoyancy alone breaks the seal for gas: all gas leaks, and oil
        // leaks by its own threshold.
        if max_gas_level.precedes(&Content::ORIGIN) {
            return Ok(TwoPhaseOutcome {
                gas: Escaped::leaked(gas_volume),
                oil: Escaped::leaked(self.leak_oil.distribute(oil_volume)),
            });
        }

        let gas_content = self.level_to_volume.content_at_volume(gas_volume);
        if !max_gas_level.precedes(&gas_content) {
            return Ok(TwoPhaseOutcome::default());
        }

        // The gas level and the hydrocarbon level may sit on different linear
        // pieces of the map. Fix the gas piece first; restricted to it, the
        // hydrocarbon piece follows uniquely, and with both fixed the final
        // gas content is linear algebra.
        let gas_index = locate(self.level_to_volume, &max_gas_level, "gas level")?;
        let gas_limits = self.level_to_volume.segment(gas_index);

        let final_gas = if gas_limits.0.volume == gas_limits.1.volume {
            // Gas volume is fixed along a plateau of the map.
            let hc_level = self
                .level_to_volume
                .invert(gas_limits.0.volume + oil_volume);
            solve_plateau_gas_content(
                self.leak_gas.max_level(),
                self.oil_to_gas_level_ratio,
                hc_level,
                gas_limits,
            )
        } else {
            let max_hc_level = LimitedFixedOilMaxBuoyancyHcLevel::new(
                self.leak_gas.max_level(),
                self.oil_to_gas_level_ratio,
                oil_volume,
                gas_limits,
            );
            let hc_index = locate(self.level_to_volume, &max_hc_level, "hydrocarbon level")?;
            solve_final_gas_content(
                self.leak_gas.max_level(),
                self.oil_to_gas_level_ratio,
                oil_volume,
                gas_limits,
                self.level_to_volume.segment(hc_index),
            )?
        };

        Ok(TwoPhaseOutcome {
            gas: Escaped::leaked(gas_volume - final_gas.volume),
            oil: Escaped::default(),
        }
        .non_negative())
    }
}

/// Leaking of gas topping an oil column in a trap that may be filled to its
/// spill point.
///
/// Oil sits below gas and reaches the spill point first, so oil always spills
/// before gas does.
#[derive(Clone, Copy, Debug)]
pub struct TwoPhaseLeakOrSpill<'m> {
    leak: TwoPhaseLeak<'m>,
    spill: Spill,
    oil_leak_or_spill: LeakOrSpill,
}

impl<'m> TwoPhaseLeakOrSpill<'m> {
    pub fn new(leak: TwoPhaseLeak<'m>) -> Self {
        let spill = Spill::new(leak.level_to_volume);
        TwoPhaseLeakOrSpill {
            leak,
            spill,
            oil_leak_or_spill: LeakOrSpill::new(leak.leak_oil, spill),
        }
    }

    pub fn leak(&self) -> &TwoPhaseLeak<'m> {
        &self.leak
    }

    pub fn distribute(
        &self,
        gas_volume: f64,
        oil_volume: f64,
    ) -> Result<TwoPhaseOutcome, DistributionError> {
        let level_to_volume = self.leak.level_to_volume;
        let capacity = level_to_volume.capacity();

        if gas_volume + oil_volume < capacity.volume {
            return self.leak.distribute(gas_volume, oil_volume);
        }

        if self.leak.max_gas_level_query(oil_volume).precedes(&Content::ORIGIN) {
            let (oil_leaked, oil_spilled) = self.oil_leak_or_spill.distribute(oil_volume);
            return Ok(TwoPhaseOutcome {
                gas: Escaped::leaked(gas_volume),
                oil: Escaped {
                    leaked: oil_leaked,
                    wasted: 0.0,
                    spilled: oil_spilled,
                },
            });
        }

        let max_gas_level = CapacityMaxBuoyancyGasLevel::new(
            self.leak.leak_gas.max_level(),
            self.leak.oil_to_gas_level_ratio,
            capacity.level,
        );

        // As much gas as possible, oil filling the rest of the trap: if even
        // that does not break the seal, nothing leaks.
        let max_gas = level_to_volume.content_at_volume(gas_volume.min(capacity.volume));
        if !max_gas_level.precedes(&max_gas) {
            trace!("trap at capacity only spills");
            let oil_retained = capacity.volume - max_gas.volume;
            return Ok(TwoPhaseOutcome {
                gas: Escaped::spilled(gas_volume - max_gas.volume),
                oil: Escaped::spilled(oil_volume - oil_retained),
            }
            .non_negative());
        }

        // All oil retained, as little gas as needed to fill the trap: if that
        // still breaks the seal, gas leaks until the trap is no longer full.
        let min_gas = level_to_volume.content_at_volume((capacity.volume - oil_volume).max(0.0));
        if max_gas_level.precedes(&min_gas) {
            trace!("trap at capacity only leaks");
            return self.leak.distribute(gas_volume, oil_volume);
        }

        let gas_index = locate(level_to_volume, &max_gas_level, "gas level at capacity")?;
        let final_gas = solve_capacity_gas_content(
            self.leak.leak_gas.max_level(),
            self.leak.oil_to_gas_level_ratio,
            capacity.level,
            level_to_volume.segment(gas_index),
        )?;
        let oil_retained = capacity.volume - final_gas.volume;

        Ok(TwoPhaseOutcome {
            gas: Escaped::leaked(gas_volume - final_gas.volume),
            oil: Escaped::spilled(oil_volume - oil_retained),
        }
        .non_negative())
    }

    pub fn spill(&self) -> &Spill {
        &self.spill
    }
}

/// Gas leaking or wasting, whichever is tighter, on top of oil that may
/// spill.
#[derive(Clone, Copy, Debug)]
pub struct TwoPhaseLeakOrWasteOrSpill<'m> {
    leak_or_spill: TwoPhaseLeakOrSpill<'m>,
    waste_and_spill: WasteGasAndSpillOil,
}

impl<'m> TwoPhaseLeakOrWasteOrSpill<'m> {
    pub fn new(leak: TwoPhaseLeak<'m>, waste_level: f64) -> Self {
        TwoPhaseLeakOrWasteOrSpill {
            leak_or_spill: TwoPhaseLeakOrSpill::new(leak),
            waste_and_spill: WasteGasAndSpillOil::new(waste_level, leak.level_to_volume),
        }
    }

    pub fn distribute(
        &self,
        gas_volume: f64,
        oil_volume: f64,
    ) -> Result<TwoPhaseOutcome, DistributionError> {
        let outcome = self.leak_or_spill.distribute(gas_volume, oil_volume)?;
        let gas_retained = gas_volume - outcome.gas.total();

        // Less gas means less buoyancy, so once the waste ceiling caps the
        // gas below the leak equilibrium the seal holds.
        if gas_retained > self.waste_and_spill.waste.max_volume() {
            trace!("waste level is tighter than the seal");
            Ok(self.waste_and_spill.distribute(gas_volume, oil_volume))
        } else {
            Ok(outcome)
        }
    }
}

/// Gas escaping at a waste level, oil spilling at the spill point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WasteGasAndSpillOil {
    waste: Waste,
    spill: Spill,
}

impl WasteGasAndSpillOil {
    pub fn new(waste_level: f64, level_to_volume: &LevelVolumeMap) -> Self {
        WasteGasAndSpillOil {
            waste: Waste::new(waste_level, level_to_volume),
            spill: Spill::new(level_to_volume),
        }
    }

    pub fn distribute(&self, gas_volume: f64, oil_volume: f64) -> TwoPhaseOutcome {
        let gas_wasted = self.waste.distribute(gas_volume);
        let gas_retained = gas_volume - gas_wasted;
        let oil_spilled = self
            .spill
            .distribute(gas_retained + oil_volume)
            .min(oil_volume);
        TwoPhaseOutcome {
            gas: Escaped::wasted(gas_wasted),
            oil: Escaped::spilled(oil_spilled),
        }
    }
}

/// Gas and oil spilling at the spill point, oil first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpillOilAndGas {
    spill: Spill,
}

impl SpillOilAndGas {
    pub fn new(level_to_volume: &LevelVolumeMap) -> Self {
        SpillOilAndGas {
            spill: Spill::new(level_to_volume),
        }
    }

    pub fn distribute(&self, gas_volume: f64, oil_volume: f64) -> TwoPhaseOutcome {
        let excess = self.spill.distribute(gas_volume + oil_volume);
        let oil_spilled = excess.min(oil_volume);
        TwoPhaseOutcome {
            gas: Escaped::spilled(excess - oil_spilled),
            oil: Escaped::spilled(oil_spilled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buoyancy::gas_equivalent_level;
    use approx::assert_abs_diff_eq;

    fn trap() -> LevelVolumeMap {
        LevelVolumeMap::new(vec![(0.0, 0.0), (2.0, 50.0), (4.0, 150.0)]).unwrap()
    }

    fn wide_trap() -> LevelVolumeMap {
        LevelVolumeMap::new(vec![
            (0.0, 0.0),
            (10.0, 100.0),
            (20.0, 400.0),
            (30.0, 900.0),
            (40.0, 1600.0),
        ])
        .unwrap()
    }

    /// Gas with a seal strength giving a 15 m gas column, r = 0.25.
    fn leak(map: &LevelVolumeMap) -> TwoPhaseLeak<'_> {
        leak_at(map, 15.0)
    }

    /// Gas with a seal strength giving a `max_level` gas column, r = 0.25.
    fn leak_at(map: &LevelVolumeMap, max_level: f64) -> TwoPhaseLeak<'_> {
        let gas_pressure = max_level * GRAVITY_CONTRAST_GAS;
        TwoPhaseLeak::new(
            200.0,
            800.0,
            1000.0,
            0.0,
            0.0,
            gas_pressure,
            gas_pressure,
            1.0e9,
            map,
        )
        .unwrap()
    }

    /// Volume does not grow between levels 1 and 3.
    fn plateau_trap() -> LevelVolumeMap {
        LevelVolumeMap::new(vec![(0.0, 0.0), (1.0, 10.0), (3.0, 10.0), (4.0, 20.0)]).unwrap()
    }

    /// Volume jumps from 10 to 30 at level 1.
    fn step_trap() -> LevelVolumeMap {
        LevelVolumeMap::new(vec![(0.0, 0.0), (1.0, 10.0), (1.0, 30.0), (3.0, 50.0)]).unwrap()
    }

    const GRAVITY_CONTRAST_GAS: f64 = crate::escape::GRAVITY * 800.0;

    #[test]
    fn oil_buoyancy_alone_leaks_all_gas() {
        let map = trap();
        let leak =
            TwoPhaseLeak::new(5.0, 800.0, 1073.0, 0.2, 2.0, 10000.0, 5000.0, 20000.0, &map)
                .unwrap();
        let outcome = leak.distribute(300.0, 200.0).unwrap();
        assert_abs_diff_eq!(outcome.gas.leaked, 300.0);
        assert_abs_diff_eq!(outcome.oil.leaked, 63.3095365225, epsilon = 1e-8);
    }

    #[test]
    fn rejects_invalid_densities() {
        let map = trap();
        assert!(matches!(
            TwoPhaseLeak::new(0.0, 800.0, 1073.0, 0.0, 0.0, 1.0, 1.0, 1.0, &map),
            Err(DistributionError::InvalidDensity { name: "gas", .. })
        ));
        assert!(matches!(
            TwoPhaseLeak::new(800.0, 800.0, 1073.0, 0.0, 0.0, 1.0, 1.0, 1.0, &map),
            Err(DistributionError::InvalidDensityRatio { .. })
        ));
        // oil heavier than the seal fluid clamps to a zero ratio
        assert!(TwoPhaseLeak::new(5.0, 1100.0, 1073.0, 0.0, 0.0, 1.0, 1.0, 1.0, &map).is_err());
    }

    #[test]
    fn nothing_leaks_below_threshold() {
        let map = wide_trap();
        let leak = leak(&map);
        assert_abs_diff_eq!(leak.oil_to_gas_level_ratio(), 0.25);
        assert_eq!(leak.distribute(100.0, 100.0).unwrap(), TwoPhaseOutcome::default());
    }

    #[test]
    fn gas_leaks_to_buoyancy_equilibrium() {
        let map = wide_trap();
        let leak = leak(&map);
        let oil_volume = 300.0;
        let outcome = leak.distribute(500.0, oil_volume).unwrap();
        assert!(outcome.gas.leaked > 0.0);
        assert_eq!(outcome.oil, Escaped::default());

        let gas_retained = 500.0 - outcome.gas.leaked;
        let level = gas_equivalent_level(
            map.invert(gas_retained),
            map.invert(gas_retained + oil_volume),
            leak.oil_to_gas_level_ratio(),
        );
        assert_abs_diff_eq!(level, leak.leak_gas().max_level(), epsilon = 1e-9);
    }

    #[test]
    fn without_oil_matches_single_fluid_leak() {
        let map = wide_trap();
        let leak = leak(&map);
        for gas_volume in [50.0, 150.0, 225.0, 400.0, 800.0, 1500.0] {
            let outcome = leak.distribute(gas_volume, 0.0).unwrap();
            assert_abs_diff_eq!(
                outcome.gas.leaked,
                leak.leak_gas().distribute(gas_volume),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn capacity_only_spills_with_strong_seal() {
        let map = wide_trap();
        let strong =
            TwoPhaseLeak::new(200.0, 800.0, 1000.0, 0.0, 0.0, 1.0e7, 1.0e7, 1.0e7, &map).unwrap();
        let outcome = TwoPhaseLeakOrSpill::new(strong).distribute(300.0, 1500.0).unwrap();
        assert_eq!(outcome.gas, Escaped::default());
        assert_abs_diff_eq!(outcome.oil.spilled, 200.0);
    }

    #[test]
    fn capacity_leaks_gas_and_spills_oil() {
        let map = wide_trap();
        let leak = leak(&map);
        // 1600 capacity at level 40, r = 0.25: gas may reach (15 - 10) / 0.75
        let outcome = TwoPhaseLeakOrSpill::new(leak).distribute(600.0, 1550.0).unwrap();
        let final_gas = map.apply(5.0 / 0.75);
        assert_abs_diff_eq!(outcome.gas.leaked, 600.0 - final_gas, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.oil.spilled, 1550.0 - (1600.0 - final_gas), epsilon = 1e-9);
        assert_eq!(outcome.gas.spilled, 0.0);
        assert_eq!(outcome.oil.leaked, 0.0);
    }

    #[test]
    fn capacity_only_leaks_with_little_oil() {
        let map = wide_trap();
        let leak = leak(&map);
        let outcome = TwoPhaseLeakOrSpill::new(leak).distribute(1500.0, 200.0).unwrap();
        assert_eq!(outcome, leak.distribute(1500.0, 200.0).unwrap());
        assert_eq!(outcome.oil.spilled, 0.0);
    }

    #[test]
    fn below_capacity_delegates_to_leak() {
        let map = wide_trap();
        let leak = leak(&map);
        let outcome = TwoPhaseLeakOrSpill::new(leak).distribute(500.0, 300.0).unwrap();
        assert_eq!(outcome, leak.distribute(500.0, 300.0).unwrap());
    }

    #[test]
    fn waste_ceiling_tighter_than_seal() {
        let map = wide_trap();
        let leak = leak(&map);
        let outcome = TwoPhaseLeakOrWasteOrSpill::new(leak, 10.0).distribute(500.0, 300.0).unwrap();
        assert_eq!(outcome.gas.leaked, 0.0);
        assert_abs_diff_eq!(outcome.gas.wasted, 400.0);
        assert_eq!(outcome.oil, Escaped::default());
    }

    #[test]
    fn seal_tighter_than_waste_ceiling() {
        let map = wide_trap();
        let leak = leak(&map);
        let outcome = TwoPhaseLeakOrWasteOrSpill::new(leak, 35.0).distribute(500.0, 300.0).unwrap();
        assert_eq!(outcome, leak.distribute(500.0, 300.0).unwrap());
        assert_eq!(outcome.gas.wasted, 0.0);
    }

    #[test]
    fn waste_gas_and_spill_oil() {
        let map = trap();
        let outcome = WasteGasAndSpillOil::new(2.0, &map).distribute(80.0, 120.0);
        assert_abs_diff_eq!(outcome.gas.wasted, 30.0);
        assert_abs_diff_eq!(outcome.oil.spilled, 20.0);
    }

    #[test]
    fn oil_spills_before_gas() {
        let map = LevelVolumeMap::new(vec![(0.0, 0.0), (1.0, 100.0)]).unwrap();
        let outcome = SpillOilAndGas::new(&map).distribute(140.0, 60.0);
        assert_abs_diff_eq!(outcome.oil.spilled, 60.0);
        assert_abs_diff_eq!(outcome.gas.spilled, 40.0);

        let outcome = SpillOilAndGas::new(&map).distribute(50.0, 60.0);
        assert_abs_diff_eq!(outcome.oil.spilled, 10.0);
        assert_eq!(outcome.gas.spilled, 0.0);
    }

    #[test]
    fn plateau_without_oil_matches_single_fluid_leak() {
        let map = plateau_trap();
        let leak = leak_at(&map, 2.5);
        for gas_volume in [5.0, 10.0, 12.0, 15.0, 19.0] {
            let outcome = leak.distribute(gas_volume, 0.0).unwrap();
            assert_abs_diff_eq!(
                outcome.gas.leaked,
                leak.leak_gas().distribute(gas_volume),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn gas_on_plateau_keeps_the_plateau_volume() {
        let map = plateau_trap();
        let outcome = leak_at(&map, 2.5).distribute(15.0, 1.0).unwrap();
        assert_abs_diff_eq!(outcome.gas.leaked, 5.0, epsilon = 1e-9);
        assert_eq!(outcome.oil, Escaped::default());
    }

    #[test]
    fn step_without_oil_matches_single_fluid_leak() {
        let map = step_trap();
        let leak = leak_at(&map, 1.25);
        for gas_volume in [20.0, 40.0, 50.0] {
            let outcome = leak.distribute(gas_volume, 0.0).unwrap();
            assert_abs_diff_eq!(
                outcome.gas.leaked,
                leak.leak_gas().distribute(gas_volume),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn gas_on_vertical_step() {
        let map = step_trap();
        let leak = leak_at(&map, 1.25);
        // gas stays at level 1, oil below it reaches level 2
        let outcome = leak.distribute(35.0, 20.0).unwrap();
        assert_abs_diff_eq!(outcome.gas.leaked, 15.0, epsilon = 1e-9);

        let level = gas_equivalent_level(map.invert(20.0), map.invert(40.0), 0.25);
        assert_abs_diff_eq!(level, leak.leak_gas().max_level(), epsilon = 1e-9);
    }

    #[test]
    fn hydrocarbons_on_vertical_step() {
        let map =
            LevelVolumeMap::new(vec![(0.0, 0.0), (2.0, 20.0), (2.0, 60.0), (4.0, 80.0)]).unwrap();
        let outcome = leak_at(&map, 1.0).distribute(15.0, 30.0).unwrap();
        assert_abs_diff_eq!(outcome.gas.leaked, 15.0 - 20.0 / 3.0, epsilon = 1e-9);
    }
}
