// Python bindings

use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
use pyo3::{exceptions::PyValueError, prelude::*};

use crate::composition::{CapillaryStrengths, Composition, FixedCapillarySealStrength, FluidBatch};
use crate::distributor::{
    Distributor, DistributorConfig, LeakWasteAndSpillDistributor, PhaseDistribution,
};
use crate::error::DistributionError;
use crate::level_volume::LevelVolumeMap;

impl From<DistributionError> for PyErr {
    fn from(err: DistributionError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

type PhaseVolumes = (f64, f64, f64, f64);

fn phase_volumes(phase: &PhaseDistribution<FluidBatch>) -> PhaseVolumes {
    (
        phase.remaining.volume(),
        phase.leaked.volume(),
        phase.wasted.volume(),
        phase.spilled.volume(),
    )
}

#[pymodule]
fn trapfill(m: &Bound<'_, PyModule>) -> PyResult<()> {
    //wrapper
    #[pyfn(m)]
    #[pyo3(name = "level_to_volume")]
    fn level_to_volume_py<'py>(
        py: Python<'py>,
        levels: PyReadonlyArray1<f64>,
        volumes: PyReadonlyArray1<f64>,
        query: PyReadonlyArray1<f64>,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let map = LevelVolumeMap::from_arrays(levels.as_array(), volumes.as_array())?;
        Ok(map.apply_many(query.as_array()).into_pyarray_bound(py))
    }

    #[pyfn(m)]
    #[pyo3(name = "volume_to_level")]
    fn volume_to_level_py<'py>(
        py: Python<'py>,
        levels: PyReadonlyArray1<f64>,
        volumes: PyReadonlyArray1<f64>,
        query: PyReadonlyArray1<f64>,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let map = LevelVolumeMap::from_arrays(levels.as_array(), volumes.as_array())?;
        Ok(map.invert_many(query.as_array()).into_pyarray_bound(py))
    }

    /// Gas and oil are given as (density, volume). Returns (gas, oil, final gas
    /// level, final hydrocarbon level), where gas and oil are (remaining,
    /// leaked, wasted, spilled) volumes.
    #[pyfn(m)]
    #[pyo3(name = "distribute")]
    #[pyo3(signature = (
        levels,
        volumes,
        gas,
        oil,
        seal_fluid_density,
        fracture_seal_strength,
        capillary_seal_strength = (f64::INFINITY, f64::INFINITY),
        waste_level = None,
        over_pressure_contrast = 0.0,
        crest_column_thickness = 0.0,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn distribute_py(
        levels: PyReadonlyArray1<f64>,
        volumes: PyReadonlyArray1<f64>,
        gas: (f64, f64),
        oil: (f64, f64),
        seal_fluid_density: f64,
        fracture_seal_strength: f64,
        capillary_seal_strength: (f64, f64),
        waste_level: Option<f64>,
        over_pressure_contrast: f64,
        crest_column_thickness: f64,
    ) -> PyResult<(PhaseVolumes, PhaseVolumes, f64, f64)> {
        let map = LevelVolumeMap::from_arrays(levels.as_array(), volumes.as_array())?;
        let config = DistributorConfig {
            seal_fluid_density,
            fracture_seal_strength,
            waste_level,
            leaking: true,
            over_pressure_contrast,
            crest_column_thickness,
        };
        let capillary = FixedCapillarySealStrength(CapillaryStrengths {
            gas: capillary_seal_strength.0,
            oil: capillary_seal_strength.1,
        });
        let distributor = LeakWasteAndSpillDistributor::new(config, capillary, &map)?;

        let gas = FluidBatch::new(gas.0, gas.1);
        let oil = FluidBatch::new(oil.0, oil.1);
        // Fixed capillary strengths ignore temperature and brine pressure.
        let distribution = distributor.distribute(&gas, &oil, 0.0, 0.0)?;
        Ok((
            phase_volumes(&distribution.gas),
            phase_volumes(&distribution.oil),
            distribution.final_gas_level,
            distribution.final_hc_level,
        ))
    }

    Ok(())
}
