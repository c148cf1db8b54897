// Distribution of trap charges over retained, leaked, wasted and spilled

use std::borrow::Cow;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::buoyancy::oil_to_gas_level_ratio;
use crate::composition::{compute_gorm, CapillarySealStrength, CapillaryStrengths, Composition};
use crate::error::DistributionError;
use crate::escape::{is_unbounded, Escape, Escaped, Leak, Spill, Waste};
use crate::level_volume::{Content, LevelVolumeMap};
use crate::selector::{LeakOrSpill, LeakOrWaste};
use crate::two_phase::{
    SpillOilAndGas, TwoPhaseLeak, TwoPhaseLeakOrSpill, TwoPhaseLeakOrWasteOrSpill, TwoPhaseOutcome,
    WasteGasAndSpillOil,
};

fn default_leaking() -> bool {
    true
}

/// Seal and trap parameters of a [`LeakWasteAndSpillDistributor`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributorConfig {
    /// Density of the fluid in the seal.
    pub seal_fluid_density: f64,
    /// Fracture strength of the seal, i.e. fracture pressure minus pore pressure.
    pub fracture_seal_strength: f64,
    /// Level, in the coordinates of the level-to-volume map, at which gas is
    /// wasted. `None` disables wasting.
    #[serde(default)]
    pub waste_level: Option<f64>,
    #[serde(default = "default_leaking")]
    pub leaking: bool,
    #[serde(default)]
    pub over_pressure_contrast: f64,
    #[serde(default)]
    pub crest_column_thickness: f64,
}

impl DistributorConfig {
    pub fn new(seal_fluid_density: f64, fracture_seal_strength: f64) -> Self {
        DistributorConfig {
            seal_fluid_density,
            fracture_seal_strength,
            waste_level: None,
            leaking: true,
            over_pressure_contrast: 0.0,
            crest_column_thickness: 0.0,
        }
    }

    pub fn with_waste_level(mut self, waste_level: f64) -> Self {
        self.waste_level = Some(waste_level);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Gas,
    Oil,
}

/// The sub-algorithm a distribution call runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionCase {
    LeakOrWasteGasAndSpillOil,
    LeakGasAndSpillOil,
    WasteGasAndSpillOil,
    SpillOilAndGas,
    LeakOrWaste(Phase),
    LeakOrSpill(Phase),
    Waste(Phase),
    Spill(Phase),
}

impl DistributionCase {
    /// Pick the sub-algorithm for the phases present and the active escape
    /// mechanisms. `None` when the trap holds nothing.
    pub fn select(
        gas_present: bool,
        oil_present: bool,
        leaking: bool,
        wasting: bool,
    ) -> Option<Self> {
        let single = |phase| match (leaking, wasting) {
            (true, true) => DistributionCase::LeakOrWaste(phase),
            (true, false) => DistributionCase::LeakOrSpill(phase),
            (false, true) => DistributionCase::Waste(phase),
            (false, false) => DistributionCase::Spill(phase),
        };
        match (gas_present, oil_present) {
            (true, true) => Some(match (leaking, wasting) {
                (true, true) => DistributionCase::LeakOrWasteGasAndSpillOil,
                (true, false) => DistributionCase::LeakGasAndSpillOil,
                (false, true) => DistributionCase::WasteGasAndSpillOil,
                (false, false) => DistributionCase::SpillOilAndGas,
            }),
            (true, false) => Some(single(Phase::Gas)),
            (false, true) => Some(single(Phase::Oil)),
            (false, false) => None,
        }
    }
}

/// What became of one phase.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseDistribution<C> {
    pub remaining: C,
    pub leaked: C,
    pub wasted: C,
    pub spilled: C,
}

impl<C: Composition> PhaseDistribution<C> {
    fn new(input: &C, escaped: Escaped) -> Self {
        PhaseDistribution {
            remaining: input.with_volume(input.volume() - escaped.total()),
            leaked: input.with_volume(escaped.leaked),
            wasted: input.with_volume(escaped.wasted),
            spilled: input.with_volume(escaped.spilled),
        }
    }

    pub fn escaped(&self) -> Escaped {
        Escaped {
            leaked: self.leaked.volume(),
            wasted: self.wasted.volume(),
            spilled: self.spilled.volume(),
        }
    }
}

/// Result of distributing the gas and oil charge of a trap.
#[derive(Clone, Debug, PartialEq)]
pub struct Distribution<C> {
    pub gas: PhaseDistribution<C>,
    pub oil: PhaseDistribution<C>,
    /// Level of the gas-oil contact, in the coordinates of the map as given.
    pub final_gas_level: f64,
    /// Level of the hydrocarbon-water contact, in the coordinates of the map as given.
    pub final_hc_level: f64,
    pub case: Option<DistributionCase>,
}

/// Translate a map so that it starts at the origin, borrowing it when it
/// already does.
fn shift_to_origin(level_to_volume: Cow<'_, LevelVolumeMap>) -> (Cow<'_, LevelVolumeMap>, Content) {
    let first = level_to_volume.first();
    if first == Content::ORIGIN {
        (level_to_volume, Content::ORIGIN)
    } else {
        let shifted = level_to_volume.shift_by(Content::new(-first.level, -first.volume));
        (Cow::Owned(shifted), first)
    }
}

/// Trap level-to-volume function, shifted to start at the origin.
#[derive(Clone, Debug)]
struct InstalledMap<'m> {
    level_to_volume: Cow<'m, LevelVolumeMap>,
    shift: Content,
}

impl<'m> InstalledMap<'m> {
    fn new(level_to_volume: Cow<'m, LevelVolumeMap>) -> Self {
        let (level_to_volume, shift) = shift_to_origin(level_to_volume);
        InstalledMap {
            level_to_volume,
            shift,
        }
    }

    /// Gas and hydrocarbon levels, in the coordinates of the map as given.
    fn final_levels(&self, gas_volume: f64, oil_volume: f64) -> (f64, f64) {
        let gas_level = self.level_to_volume.invert(gas_volume) + self.shift.level;
        let hc_level = self.level_to_volume.invert(gas_volume + oil_volume) + self.shift.level;
        (gas_level, hc_level)
    }

    fn assemble<C: Composition>(
        &self,
        gas: &C,
        oil: &C,
        outcome: TwoPhaseOutcome,
        case: Option<DistributionCase>,
    ) -> Distribution<C> {
        let gas = PhaseDistribution::new(gas, outcome.gas);
        let oil = PhaseDistribution::new(oil, outcome.oil);
        let (final_gas_level, final_hc_level) =
            self.final_levels(gas.remaining.volume(), oil.remaining.volume());
        Distribution {
            gas,
            oil,
            final_gas_level,
            final_hc_level,
            case,
        }
    }
}

/// Splits the gas and oil charge of a trap.
pub trait Distributor {
    fn set_leaking(&mut self, _leaking: bool) {}

    fn set_wasting(&mut self, _wasting: bool) {}

    fn set_waste_level(&mut self, _waste_level: f64) {}

    /// # Arguments
    /// * gas: the gas charge
    /// * oil: the oil charge
    /// * temperature_k: trap temperature in K
    /// * brine_pressure: pressure of the brine in the seal
    fn distribute<C: Composition>(
        &self,
        gas: &C,
        oil: &C,
        temperature_k: f64,
        brine_pressure: f64,
    ) -> Result<Distribution<C>, DistributionError>;
}

/// Leaking through the seal, wasting at a waste level and spilling at the
/// spill point of a trap.
///
/// Holds only configuration: every call to
/// [`distribute`](Distributor::distribute) is independent of the previous
/// ones.
#[derive(Clone, Debug)]
pub struct LeakWasteAndSpillDistributor<'m, S> {
    config: DistributorConfig,
    capillary_seal_strength: S,
    map: InstalledMap<'m>,
    wasting: bool,
    waste_level: f64,
}

impl<'m, S: CapillarySealStrength> LeakWasteAndSpillDistributor<'m, S> {
    pub fn new(
        config: DistributorConfig,
        capillary_seal_strength: S,
        level_to_volume: &'m LevelVolumeMap,
    ) -> Result<Self, DistributionError> {
        Self::with_map(config, capillary_seal_strength, Cow::Borrowed(level_to_volume))
    }

    pub fn with_map(
        config: DistributorConfig,
        capillary_seal_strength: S,
        level_to_volume: Cow<'m, LevelVolumeMap>,
    ) -> Result<Self, DistributionError> {
        if !(config.seal_fluid_density > 0.0 && config.seal_fluid_density.is_finite()) {
            return Err(DistributionError::InvalidDensity {
                name: "seal fluid",
                value: config.seal_fluid_density,
            });
        }
        let distributor = LeakWasteAndSpillDistributor {
            wasting: config.waste_level.is_some(),
            waste_level: config.waste_level.unwrap_or(f64::INFINITY),
            config,
            capillary_seal_strength,
            map: InstalledMap::new(level_to_volume),
        };
        distributor.check_waste_level();
        Ok(distributor)
    }

    /// Install a new level-to-volume function, replacing the current one.
    pub fn set_level_to_volume(&mut self, level_to_volume: &'m LevelVolumeMap) {
        self.map = InstalledMap::new(Cow::Borrowed(level_to_volume));
        self.check_waste_level();
    }

    pub fn config(&self) -> &DistributorConfig {
        &self.config
    }

    pub fn fracture_seal_strength(&self) -> f64 {
        self.config.fracture_seal_strength
    }

    pub fn capillary_seal_strength(&self) -> &S {
        &self.capillary_seal_strength
    }

    pub fn level_to_volume(&self) -> &LevelVolumeMap {
        &self.map.level_to_volume
    }

    pub fn is_leaking(&self) -> bool {
        self.config.leaking
    }

    pub fn is_wasting(&self) -> bool {
        self.wasting
    }

    /// The waste level in the shifted coordinates, when wasting can take
    /// place before spilling.
    fn effective_waste_level(&self) -> Option<f64> {
        if !self.wasting {
            return None;
        }
        let waste_level = self.waste_level - self.map.shift.level;
        if waste_level < self.map.level_to_volume.capacity().level {
            Some(waste_level)
        } else {
            None
        }
    }

    fn check_waste_level(&self) {
        if self.wasting && self.effective_waste_level().is_none() {
            warn!(
                "waste level {} is not above the spill level {}, wasting is ineffective",
                self.waste_level,
                self.map.level_to_volume.capacity().level + self.map.shift.level
            );
        }
    }

    /// Whether a single phase can leak at all.
    fn phase_leaking(&self, density: f64, capillary_strength: f64) -> bool {
        self.config.leaking
            && density <= self.config.seal_fluid_density
            && !is_unbounded(self.config.fracture_seal_strength.min(capillary_strength))
    }

    /// Whether gas topping oil can leak: gas must be able to leak and the
    /// densities must order as gas, oil, seal fluid.
    fn two_phase_leaking(
        &self,
        gas_density: f64,
        oil_density: f64,
        strengths: CapillaryStrengths,
    ) -> bool {
        let seal_fluid_density = self.config.seal_fluid_density;
        self.phase_leaking(gas_density, strengths.gas)
            && oil_to_gas_level_ratio(
                gas_density.min(seal_fluid_density),
                oil_density.min(seal_fluid_density),
                seal_fluid_density,
            )
            .is_ok()
    }

    fn leak(&self, density: f64, capillary_strength: f64) -> Leak {
        Leak::new(
            density,
            self.config.seal_fluid_density,
            self.config.over_pressure_contrast,
            self.config.crest_column_thickness,
            self.config.fracture_seal_strength.min(capillary_strength),
            &self.map.level_to_volume,
        )
    }

    fn two_phase_leak(
        &self,
        gas_density: f64,
        oil_density: f64,
        strengths: CapillaryStrengths,
    ) -> Result<TwoPhaseLeak<'_>, DistributionError> {
        TwoPhaseLeak::new(
            gas_density,
            oil_density,
            self.config.seal_fluid_density,
            self.config.over_pressure_contrast,
            self.config.crest_column_thickness,
            self.config.fracture_seal_strength,
            strengths.gas,
            strengths.oil,
            &self.map.level_to_volume,
        )
    }

    fn run_case<C: Composition>(
        &self,
        case: DistributionCase,
        gas: &C,
        oil: &C,
        strengths: CapillaryStrengths,
        waste_level: f64,
    ) -> Result<TwoPhaseOutcome, DistributionError> {
        let level_to_volume = &*self.map.level_to_volume;
        let (gas_volume, oil_volume) = (gas.volume(), oil.volume());

        let single = |phase: Phase, escaped: Escaped| match phase {
            Phase::Gas => TwoPhaseOutcome {
                gas: escaped,
                oil: Escaped::default(),
            },
            Phase::Oil => TwoPhaseOutcome {
                gas: Escaped::default(),
                oil: escaped,
            },
        };
        let phase_input = |phase: Phase| match phase {
            Phase::Gas => (gas.density(), gas_volume, strengths.gas),
            Phase::Oil => (oil.density(), oil_volume, strengths.oil),
        };

        let outcome = match case {
            DistributionCase::LeakOrWasteGasAndSpillOil => {
                let leak = self.two_phase_leak(gas.density(), oil.density(), strengths)?;
                TwoPhaseLeakOrWasteOrSpill::new(leak, waste_level)
                    .distribute(gas_volume, oil_volume)?
            }
            DistributionCase::LeakGasAndSpillOil => {
                let leak = self.two_phase_leak(gas.density(), oil.density(), strengths)?;
                TwoPhaseLeakOrSpill::new(leak).distribute(gas_volume, oil_volume)?
            }
            DistributionCase::WasteGasAndSpillOil => {
                WasteGasAndSpillOil::new(waste_level, level_to_volume)
                    .distribute(gas_volume, oil_volume)
            }
            DistributionCase::SpillOilAndGas => {
                SpillOilAndGas::new(level_to_volume).distribute(gas_volume, oil_volume)
            }
            DistributionCase::LeakOrWaste(phase) => {
                let (density, volume, strength) = phase_input(phase);
                let selector = LeakOrWaste::new(
                    self.leak(density, strength),
                    Waste::new(waste_level, level_to_volume),
                );
                let (leaked, wasted) = selector.distribute(volume);
                single(
                    phase,
                    Escaped {
                        leaked,
                        wasted,
                        spilled: 0.0,
                    },
                )
            }
            DistributionCase::LeakOrSpill(phase) => {
                let (density, volume, strength) = phase_input(phase);
                let selector =
                    LeakOrSpill::new(self.leak(density, strength), Spill::new(level_to_volume));
                let (leaked, spilled) = selector.distribute(volume);
                single(
                    phase,
                    Escaped {
                        leaked,
                        wasted: 0.0,
                        spilled,
                    },
                )
            }
            DistributionCase::Waste(phase) => {
                let (_, volume, _) = phase_input(phase);
                let wasted = Waste::new(waste_level, level_to_volume).distribute(volume);
                single(phase, Escaped::wasted(wasted))
            }
            DistributionCase::Spill(phase) => {
                let (_, volume, _) = phase_input(phase);
                single(phase, Escaped::spilled(Spill::new(level_to_volume).distribute(volume)))
            }
        };
        Ok(outcome)
    }
}

impl<'m, S: CapillarySealStrength> Distributor for LeakWasteAndSpillDistributor<'m, S> {
    fn set_leaking(&mut self, leaking: bool) {
        self.config.leaking = leaking;
    }

    fn set_wasting(&mut self, wasting: bool) {
        self.wasting = wasting;
        self.check_waste_level();
    }

    fn set_waste_level(&mut self, waste_level: f64) {
        self.waste_level = waste_level;
        self.config.waste_level = Some(waste_level);
        self.check_waste_level();
    }

    fn distribute<C: Composition>(
        &self,
        gas: &C,
        oil: &C,
        temperature_k: f64,
        brine_pressure: f64,
    ) -> Result<Distribution<C>, DistributionError> {
        let gas_present = gas.volume() > 0.0;
        let oil_present = oil.volume() > 0.0;

        let strengths = if self.config.leaking && (gas_present || oil_present) {
            let gorm = compute_gorm(gas, oil);
            self.capillary_seal_strength
                .compute([gas, oil], gorm, temperature_k, brine_pressure)
        } else {
            CapillaryStrengths::UNBOUNDED
        };

        let leaking = match (gas_present, oil_present) {
            (true, true) => self.two_phase_leaking(gas.density(), oil.density(), strengths),
            (true, false) => self.phase_leaking(gas.density(), strengths.gas),
            (false, true) => self.phase_leaking(oil.density(), strengths.oil),
            (false, false) => false,
        };
        let waste_level = self.effective_waste_level();

        let case =
            DistributionCase::select(gas_present, oil_present, leaking, waste_level.is_some());
        debug!(
            "distributing {} gas and {} oil with capillary strengths {:?}: {:?}",
            gas.volume(),
            oil.volume(),
            strengths,
            case
        );

        let outcome = match case {
            Some(case) => self
                .run_case(case, gas, oil, strengths, waste_level.unwrap_or(f64::INFINITY))?
                .non_negative(),
            None => TwoPhaseOutcome::default(),
        };
        Ok(self.map.assemble(gas, oil, outcome, case))
    }
}

/// All gas and oil leaks, for traps without a seal.
#[derive(Clone, Debug)]
pub struct LeakAllGasAndOilDistributor<'m> {
    map: InstalledMap<'m>,
}

impl<'m> LeakAllGasAndOilDistributor<'m> {
    pub fn new(level_to_volume: &'m LevelVolumeMap) -> Self {
        LeakAllGasAndOilDistributor {
            map: InstalledMap::new(Cow::Borrowed(level_to_volume)),
        }
    }

    pub fn set_level_to_volume(&mut self, level_to_volume: &'m LevelVolumeMap) {
        self.map = InstalledMap::new(Cow::Borrowed(level_to_volume));
    }
}

impl Distributor for LeakAllGasAndOilDistributor<'_> {
    fn distribute<C: Composition>(
        &self,
        gas: &C,
        oil: &C,
        _temperature_k: f64,
        _brine_pressure: f64,
    ) -> Result<Distribution<C>, DistributionError> {
        let outcome = TwoPhaseOutcome {
            gas: Escaped::leaked(gas.volume().max(0.0)),
            oil: Escaped::leaked(oil.volume().max(0.0)),
        };
        Ok(self.map.assemble(gas, oil, outcome, None))
    }
}

/// All gas and oil spills, for undersized traps.
#[derive(Clone, Debug)]
pub struct SpillAllGasAndOilDistributor<'m> {
    map: InstalledMap<'m>,
}

impl<'m> SpillAllGasAndOilDistributor<'m> {
    pub fn new(level_to_volume: &'m LevelVolumeMap) -> Self {
        SpillAllGasAndOilDistributor {
            map: InstalledMap::new(Cow::Borrowed(level_to_volume)),
        }
    }

    pub fn set_level_to_volume(&mut self, level_to_volume: &'m LevelVolumeMap) {
        self.map = InstalledMap::new(Cow::Borrowed(level_to_volume));
    }
}

impl Distributor for SpillAllGasAndOilDistributor<'_> {
    fn distribute<C: Composition>(
        &self,
        gas: &C,
        oil: &C,
        _temperature_k: f64,
        _brine_pressure: f64,
    ) -> Result<Distribution<C>, DistributionError> {
        let outcome = TwoPhaseOutcome {
            gas: Escaped::spilled(gas.volume().max(0.0)),
            oil: Escaped::spilled(oil.volume().max(0.0)),
        };
        Ok(self.map.assemble(gas, oil, outcome, None))
    }
}

/// Any of the distributors, for traps that switch between them.
#[derive(Clone, Debug)]
pub enum TrapDistributor<'m, S> {
    LeakWasteAndSpill(LeakWasteAndSpillDistributor<'m, S>),
    LeakAll(LeakAllGasAndOilDistributor<'m>),
    SpillAll(SpillAllGasAndOilDistributor<'m>),
}

impl<'m, S: CapillarySealStrength> TrapDistributor<'m, S> {
    pub fn set_level_to_volume(&mut self, level_to_volume: &'m LevelVolumeMap) {
        match self {
            TrapDistributor::LeakWasteAndSpill(d) => d.set_level_to_volume(level_to_volume),
            TrapDistributor::LeakAll(d) => d.set_level_to_volume(level_to_volume),
            TrapDistributor::SpillAll(d) => d.set_level_to_volume(level_to_volume),
        }
    }
}

impl<'m, S> From<LeakWasteAndSpillDistributor<'m, S>> for TrapDistributor<'m, S> {
    fn from(distributor: LeakWasteAndSpillDistributor<'m, S>) -> Self {
        TrapDistributor::LeakWasteAndSpill(distributor)
    }
}

impl<'m, S> From<LeakAllGasAndOilDistributor<'m>> for TrapDistributor<'m, S> {
    fn from(distributor: LeakAllGasAndOilDistributor<'m>) -> Self {
        TrapDistributor::LeakAll(distributor)
    }
}

impl<'m, S> From<SpillAllGasAndOilDistributor<'m>> for TrapDistributor<'m, S> {
    fn from(distributor: SpillAllGasAndOilDistributor<'m>) -> Self {
        TrapDistributor::SpillAll(distributor)
    }
}

impl<S: CapillarySealStrength> Distributor for TrapDistributor<'_, S> {
    fn set_leaking(&mut self, leaking: bool) {
        match self {
            TrapDistributor::LeakWasteAndSpill(d) => d.set_leaking(leaking),
            TrapDistributor::LeakAll(d) => d.set_leaking(leaking),
            TrapDistributor::SpillAll(d) => d.set_leaking(leaking),
        }
    }

    fn set_wasting(&mut self, wasting: bool) {
        match self {
            TrapDistributor::LeakWasteAndSpill(d) => d.set_wasting(wasting),
            TrapDistributor::LeakAll(d) => d.set_wasting(wasting),
            TrapDistributor::SpillAll(d) => d.set_wasting(wasting),
        }
    }

    fn set_waste_level(&mut self, waste_level: f64) {
        match self {
            TrapDistributor::LeakWasteAndSpill(d) => d.set_waste_level(waste_level),
            TrapDistributor::LeakAll(d) => d.set_waste_level(waste_level),
            TrapDistributor::SpillAll(d) => d.set_waste_level(waste_level),
        }
    }

    fn distribute<C: Composition>(
        &self,
        gas: &C,
        oil: &C,
        temperature_k: f64,
        brine_pressure: f64,
    ) -> Result<Distribution<C>, DistributionError> {
        match self {
            TrapDistributor::LeakWasteAndSpill(d) => {
                d.distribute(gas, oil, temperature_k, brine_pressure)
            }
            TrapDistributor::LeakAll(d) => d.distribute(gas, oil, temperature_k, brine_pressure),
            TrapDistributor::SpillAll(d) => d.distribute(gas, oil, temperature_k, brine_pressure),
        }
    }
}
