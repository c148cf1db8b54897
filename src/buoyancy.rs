// Buoyancy of combined gas and oil columns

use crate::error::DistributionError;
use crate::level_volume::{interpolate, Content, LevelVolumeMap, SegmentQuery};

/// Relative tolerance used when checking solved contents against their segment.
const RELATIVE_TOLERANCE: f64 = 1.0e-9;

fn tolerance(scale: f64) -> f64 {
    RELATIVE_TOLERANCE * scale.abs().max(1.0)
}

/// Ratio in which an oil column contributes to buoyancy relative to a gas
/// column of the same height.
///
/// A gas column of height $l_{gas}$ topping an oil column of height $l_{oil}$
/// generates the same pressure at the seal as a pure gas column of height
///
/// $$l_{repr} = l_{gas} + r\,l_{oil}, \qquad r = \frac{\rho_s - \rho_{oil}}{\rho_s - \rho_{gas}}$$
///
/// Note that $r$ is not $\rho_{gas} / \rho_{oil}$.
///
/// # Arguments
/// * gas_density: density of gas, at most the seal fluid density
/// * oil_density: density of oil, at most the seal fluid density
/// * seal_fluid_density: density of the fluid in the seal
///
/// # Returns
/// the ratio, which must lie strictly between 0 and 1
pub fn oil_to_gas_level_ratio(
    gas_density: f64,
    oil_density: f64,
    seal_fluid_density: f64,
) -> Result<f64, DistributionError> {
    let ratio = (seal_fluid_density - oil_density) / (seal_fluid_density - gas_density);
    if ratio > 0.0 && ratio < 1.0 {
        Ok(ratio)
    } else {
        Err(DistributionError::InvalidDensityRatio { ratio })
    }
}

/// Gas-equivalent level of a gas column at `gas_level` topping a
/// hydrocarbon column that reaches `hc_level`.
pub fn gas_equivalent_level(gas_level: f64, hc_level: f64, ratio: f64) -> f64 {
    gas_level + ratio * (hc_level - gas_level)
}

/// Does a gas content, with a fixed oil volume below it, exceed the maximum
/// gas buoyancy level?
///
/// Locating this query on the map yields the segment holding the gas level at
/// which the buoyancy of gas plus oil equals the seal strength.
#[derive(Clone, Copy, Debug)]
pub struct FixedOilMaxBuoyancyGasLevel<'m> {
    max_level: f64,
    ratio: f64,
    oil_volume: f64,
    level_to_volume: &'m LevelVolumeMap,
}

impl<'m> FixedOilMaxBuoyancyGasLevel<'m> {
    pub fn new(
        max_level: f64,
        ratio: f64,
        oil_volume: f64,
        level_to_volume: &'m LevelVolumeMap,
    ) -> Self {
        FixedOilMaxBuoyancyGasLevel {
            max_level,
            ratio,
            oil_volume,
            level_to_volume,
        }
    }

    pub fn equivalent_level(&self, gas: &Content) -> f64 {
        let hc_level = self.level_to_volume.invert(gas.volume + self.oil_volume);
        gas_equivalent_level(gas.level, hc_level, self.ratio)
    }
}

impl SegmentQuery for FixedOilMaxBuoyancyGasLevel<'_> {
    fn precedes(&self, gas: &Content) -> bool {
        self.max_level < self.equivalent_level(gas)
    }
}

/// Like [`FixedOilMaxBuoyancyGasLevel`], but queried with hydrocarbon
/// contents while the gas level is restricted to an already located segment.
///
/// Within that segment the gas level is linear in the gas volume, so the
/// gas level belonging to a hydrocarbon content follows in closed form.
#[derive(Clone, Copy, Debug)]
pub struct LimitedFixedOilMaxBuoyancyHcLevel {
    max_level: f64,
    ratio: f64,
    oil_volume: f64,
    gas_limits: (Content, Content),
}

impl LimitedFixedOilMaxBuoyancyHcLevel {
    pub fn new(
        max_level: f64,
        ratio: f64,
        oil_volume: f64,
        gas_limits: (Content, Content),
    ) -> Self {
        LimitedFixedOilMaxBuoyancyHcLevel {
            max_level,
            ratio,
            oil_volume,
            gas_limits,
        }
    }

    pub fn equivalent_level(&self, hc: &Content) -> f64 {
        let (lower, upper) = self.gas_limits;
        let gas_volume = (hc.volume - self.oil_volume).max(lower.volume).min(upper.volume);
        let gas_level =
            interpolate(gas_volume, lower.volume, upper.volume, lower.level, upper.level);
        gas_equivalent_level(gas_level, hc.level, self.ratio)
    }
}

impl SegmentQuery for LimitedFixedOilMaxBuoyancyHcLevel {
    fn precedes(&self, hc: &Content) -> bool {
        self.max_level < self.equivalent_level(hc)
    }
}

/// Does a gas content exceed the maximum gas buoyancy level when oil fills
/// the trap up to its capacity level?
#[derive(Clone, Copy, Debug)]
pub struct CapacityMaxBuoyancyGasLevel {
    max_level: f64,
    ratio: f64,
    capacity_level: f64,
}

impl CapacityMaxBuoyancyGasLevel {
    pub fn new(max_level: f64, ratio: f64, capacity_level: f64) -> Self {
        CapacityMaxBuoyancyGasLevel {
            max_level,
            ratio,
            capacity_level,
        }
    }

    pub fn equivalent_level(&self, gas: &Content) -> f64 {
        gas_equivalent_level(gas.level, self.capacity_level, self.ratio)
    }
}

impl SegmentQuery for CapacityMaxBuoyancyGasLevel {
    fn precedes(&self, gas: &Content) -> bool {
        self.max_level < self.equivalent_level(gas)
    }
}

/// `true` for a segment along which the volume jumps at a single level.
fn is_vertical(limits: (Content, Content)) -> bool {
    limits.0.level == limits.1.level
}

/// Volume at `level` along a segment; the lower volume on a vertical one.
fn volume_along(level: f64, limits: (Content, Content)) -> f64 {
    let (lower, upper) = limits;
    interpolate(level, lower.level, upper.level, lower.volume, upper.volume)
}

/// Gradient and intercept of the volume as a linear function of the level
/// over a segment that is not vertical.
fn linear_piece(limits: (Content, Content)) -> Result<(f64, f64), DistributionError> {
    let (lower, upper) = limits;
    let gradient = (upper.volume - lower.volume) / (upper.level - lower.level);
    if !gradient.is_finite() {
        return Err(DistributionError::NumericalImplausibility {
            what: "segment gradient",
            value: gradient,
        });
    }
    Ok((gradient, lower.volume - gradient * lower.level))
}

/// Clamp a solved content into its segment, rejecting anything that is more
/// than rounding noise outside of it.
fn check_within(
    content: Content,
    limits: (Content, Content),
) -> Result<Content, DistributionError> {
    let (lower, upper) = limits;
    let level_tolerance = tolerance(upper.level);
    let volume_tolerance = tolerance(upper.volume);
    if !(content.level >= lower.level - level_tolerance
        && content.level <= upper.level + level_tolerance)
    {
        return Err(DistributionError::NumericalImplausibility {
            what: "gas level outside its segment",
            value: content.level,
        });
    }
    if !(content.volume >= lower.volume - volume_tolerance
        && content.volume <= upper.volume + volume_tolerance)
    {
        return Err(DistributionError::NumericalImplausibility {
            what: "gas volume outside its segment",
            value: content.volume,
        });
    }
    if content.volume < -volume_tolerance {
        return Err(DistributionError::NumericalImplausibility {
            what: "negative gas volume",
            value: content.volume,
        });
    }
    Ok(Content::new(
        content.level.max(lower.level).min(upper.level),
        content.volume.max(lower.volume).min(upper.volume).max(0.0),
    ))
}

/// Gas content at which the buoyancy of the gas column plus a fixed oil
/// volume equals `max_level`.
///
/// With the gas level on segment `gas_limits` and the hydrocarbon level on
/// segment `hc_limits`, the following equations hold:
///
/// $$x_{gas} + r\,(x_{hc} - x_{gas}) = l_{max}$$
/// $$y_{hc} - y_{gas} = V_{oil}$$
/// $$y_{gas} = G + g\,x_{gas}, \qquad y_{hc} = H + h\,x_{hc}$$
///
/// with $g, G$ and $h, H$ the gradients and intercepts of the two segments.
/// Eliminating the hydrocarbon content gives
///
/// $$x_{gas} = \frac{h\,l_{max} - r\,(V_{oil} - H + G)}{(1 - r)\,h + r\,g}$$
///
/// A vertical segment fixes its level instead, and the other content follows
/// from the buoyancy balance directly.
///
/// The gas segment must not be flat in volume, see [`solve_plateau_gas_content`].
pub fn solve_final_gas_content(
    max_level: f64,
    ratio: f64,
    oil_volume: f64,
    gas_limits: (Content, Content),
    hc_limits: (Content, Content),
) -> Result<Content, DistributionError> {
    if is_vertical(gas_limits) {
        let gas_level = gas_limits.0.level;
        let hc_level = gas_level + (max_level - gas_level) / ratio;
        let gas_volume = (volume_along(hc_level, hc_limits) - oil_volume)
            .max(gas_limits.0.volume)
            .min(gas_limits.1.volume);
        return check_within(Content::new(gas_level, gas_volume), gas_limits);
    }

    let (gas_gradient, gas_intercept) = linear_piece(gas_limits)?;
    if is_vertical(hc_limits) {
        let gas_level = (max_level - ratio * hc_limits.0.level) / (1.0 - ratio);
        let gas_volume = gas_intercept + gas_gradient * gas_level;
        return check_within(Content::new(gas_level, gas_volume), gas_limits);
    }

    let (hc_gradient, hc_intercept) = linear_piece(hc_limits)?;
    let numerator =
        hc_gradient * max_level - ratio * (oil_volume - hc_intercept + gas_intercept);
    let denominator = (1.0 - ratio) * hc_gradient + ratio * gas_gradient;
    if denominator == 0.0 {
        return Err(DistributionError::NumericalImplausibility {
            what: "denominator of the gas level",
            value: denominator,
        });
    }

    let gas_level = numerator / denominator;
    let gas_volume = gas_intercept + gas_gradient * gas_level;
    check_within(Content::new(gas_level, gas_volume), gas_limits)
}

/// Gas content when the gas level sits on a segment without volume change.
///
/// The gas volume is that of the segment. The gas level follows from the
/// hydrocarbon level `hc_level` that this volume plus the oil reaches.
pub fn solve_plateau_gas_content(
    max_level: f64,
    ratio: f64,
    hc_level: f64,
    gas_limits: (Content, Content),
) -> Content {
    let (lower, upper) = gas_limits;
    let gas_level = (max_level - ratio * hc_level) / (1.0 - ratio);
    Content::new(gas_level.max(lower.level).min(upper.level), lower.volume)
}

/// Gas content at which the buoyancy of the gas column, with oil filling the
/// trap up to `capacity_level`, equals `max_level`.
///
/// $$x_{gas} = \frac{l_{max} - r\,x_{cap}}{1 - r}$$
pub fn solve_capacity_gas_content(
    max_level: f64,
    ratio: f64,
    capacity_level: f64,
    gas_limits: (Content, Content),
) -> Result<Content, DistributionError> {
    let gas_level = if is_vertical(gas_limits) {
        gas_limits.0.level
    } else {
        (max_level - ratio * capacity_level) / (1.0 - ratio)
    };
    let gas_volume = volume_along(gas_level, gas_limits);
    check_within(Content::new(gas_level, gas_volume), gas_limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level_volume::SegmentLocation;
    use approx::assert_abs_diff_eq;

    fn trap() -> LevelVolumeMap {
        LevelVolumeMap::new(vec![(0.0, 0.0), (2.0, 50.0), (4.0, 150.0)]).unwrap()
    }

    #[test]
    fn ratio_of_density_contrasts() {
        let ratio = oil_to_gas_level_ratio(5.0, 800.0, 1073.0).unwrap();
        assert_abs_diff_eq!(ratio, 273.0 / 1068.0, epsilon = 1e-15);
    }

    #[test]
    fn ratio_must_be_strictly_between_zero_and_one() {
        assert!(oil_to_gas_level_ratio(5.0, 1073.0, 1073.0).is_err());
        assert!(oil_to_gas_level_ratio(800.0, 800.0, 1073.0).is_err());
        assert!(oil_to_gas_level_ratio(800.0, 5.0, 1073.0).is_err());
        assert!(oil_to_gas_level_ratio(1073.0, 800.0, 1073.0).is_err());
    }

    #[test]
    fn fixed_oil_query_includes_oil_buoyancy() {
        let map = trap();
        let query = FixedOilMaxBuoyancyGasLevel::new(1.0, 0.5, 50.0, &map);
        // oil alone reaches level 2, which counts as 1 in gas units
        assert_abs_diff_eq!(query.equivalent_level(&Content::ORIGIN), 1.0);
        assert!(!query.precedes(&Content::ORIGIN));
        assert!(query.precedes(&Content::new(1.0, 25.0)));
    }

    #[test]
    fn limited_query_clamps_gas_to_its_segment() {
        let limits = (Content::new(0.0, 0.0), Content::new(2.0, 50.0));
        let query = LimitedFixedOilMaxBuoyancyHcLevel::new(1.5, 0.5, 50.0, limits);
        assert_abs_diff_eq!(query.equivalent_level(&Content::new(2.0, 50.0)), 1.0);
        assert_abs_diff_eq!(query.equivalent_level(&Content::new(3.0, 100.0)), 2.5);
        assert_abs_diff_eq!(query.equivalent_level(&Content::new(4.0, 150.0)), 3.0);
    }

    #[test]
    fn closed_form_matches_buoyancy_threshold() {
        let map = trap();
        let (max_level, ratio, oil_volume) = (1.5, 0.5, 30.0);
        let gas_query = FixedOilMaxBuoyancyGasLevel::new(max_level, ratio, oil_volume, &map);
        let gas_index = map.find_segment_index(&gas_query).index().unwrap();
        let gas_limits = map.segment(gas_index);
        let hc_query =
            LimitedFixedOilMaxBuoyancyHcLevel::new(max_level, ratio, oil_volume, gas_limits);
        let hc_index = map.find_segment_index(&hc_query).index().unwrap();
        let hc_limits = map.segment(hc_index);
        let gas =
            solve_final_gas_content(max_level, ratio, oil_volume, gas_limits, hc_limits).unwrap();

        let hc_level = map.invert(gas.volume + oil_volume);
        assert_abs_diff_eq!(
            gas_equivalent_level(gas.level, hc_level, ratio),
            max_level,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(map.apply(gas.level), gas.volume, epsilon = 1e-9);
    }

    #[test]
    fn capacity_solution() {
        let map = trap();
        let query = CapacityMaxBuoyancyGasLevel::new(3.0, 0.5, 4.0);
        // the solution sits exactly on the break point at level 2
        assert_eq!(map.find_segment_index(&query), SegmentLocation::Within(1));
        let gas = solve_capacity_gas_content(3.0, 0.5, 4.0, map.segment(1)).unwrap();
        assert_abs_diff_eq!(gas.level, 2.0);
        assert_abs_diff_eq!(gas.volume, 50.0);
    }

    #[test]
    fn solution_outside_segment_is_rejected() {
        let map = trap();
        let result = solve_capacity_gas_content(3.8, 0.5, 4.0, map.segment(0));
        assert!(matches!(
            result,
            Err(DistributionError::NumericalImplausibility { .. })
        ));
    }

    #[test]
    fn vertical_segments_fix_their_level() {
        let gas_limits = (Content::new(1.0, 10.0), Content::new(1.0, 30.0));
        let hc_limits = (Content::new(1.0, 30.0), Content::new(3.0, 50.0));
        let gas = solve_final_gas_content(1.25, 0.25, 20.0, gas_limits, hc_limits).unwrap();
        assert_abs_diff_eq!(gas.level, 1.0);
        assert_abs_diff_eq!(gas.volume, 20.0, epsilon = 1e-12);

        let gas_limits = (Content::ORIGIN, Content::new(2.0, 20.0));
        let hc_limits = (Content::new(2.0, 20.0), Content::new(2.0, 60.0));
        let gas = solve_final_gas_content(1.0, 0.25, 30.0, gas_limits, hc_limits).unwrap();
        assert_abs_diff_eq!(gas.level, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(gas.volume, 20.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn plateau_fixes_the_gas_volume() {
        let limits = (Content::new(1.0, 10.0), Content::new(3.0, 10.0));
        let gas = solve_plateau_gas_content(2.5, 0.25, 3.1, limits);
        assert_eq!(gas.volume, 10.0);
        assert_abs_diff_eq!(gas.level, 2.3, epsilon = 1e-12);
    }
}
