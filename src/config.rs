//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Deserialize;
use thiserror::Error;

use crate::data::{SyntheticProfile, TIMESTAMP_FORMAT, TimeSeries};
use crate::devices::StorageDevice;
use crate::error::{SimError, SimResult};
use crate::sim::grid::{Grid, UtilityConnection};
use crate::sim::simulator::Simulator;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the islanded baseline. Load from TOML
/// with [`ScenarioConfig::from_toml_file`] or use a named preset via
/// [`ScenarioConfig::from_preset`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Simulation horizon and global parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Storage devices, in action-mapping order.
    #[serde(default = "default_storages")]
    pub storage: Vec<StorageConfig>,
    /// Utility connection limits and import price.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Penalty prices for unserved load and wasted production.
    #[serde(default)]
    pub prices: PriceConfig,
    /// Exogenous data source.
    #[serde(default)]
    pub dataset: DatasetConfig,
}

/// Simulation horizon and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Horizon start, `"%Y-%m-%d %H:%M:%S"`.
    pub start: String,
    /// Horizon end, `"%Y-%m-%d %H:%M:%S"`.
    pub end: String,
    /// Decision interval in minutes (must be > 0).
    pub period_minutes: u32,
    /// Master random seed (synthetic data and random policies).
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: "2016-01-01 00:00:00".to_string(),
            end: "2016-01-08 00:00:00".to_string(),
            period_minutes: 60,
            seed: 42,
        }
    }
}

/// One storage device.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Device name, used in logs and telemetry columns.
    pub name: String,
    /// Total energy capacity (kWh).
    pub capacity_kwh: f64,
    /// Lower SOC bound (kWh).
    pub min_soc_kwh: f64,
    /// Upper SOC bound (kWh).
    pub max_soc_kwh: f64,
    /// SOC at episode start (kWh).
    pub initial_soc_kwh: f64,
    /// Maximum charging power (kW).
    pub max_charge_kw: f64,
    /// Maximum discharging power (kW).
    pub max_discharge_kw: f64,
    /// Charge efficiency (0.0 to 1.0).
    pub charge_efficiency: f64,
    /// Discharge efficiency (0.0 to 1.0).
    pub discharge_efficiency: f64,
    /// Aging cost per kWh of throughput.
    pub degradation_price_per_kwh: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            name: "bess1".to_string(),
            capacity_kwh: 50.0,
            min_soc_kwh: 0.0,
            max_soc_kwh: 50.0,
            initial_soc_kwh: 25.0,
            max_charge_kw: 10.0,
            max_discharge_kw: 10.0,
            charge_efficiency: 0.95,
            discharge_efficiency: 0.95,
            degradation_price_per_kwh: 0.02,
        }
    }
}

fn default_storages() -> Vec<StorageConfig> {
    vec![StorageConfig::default()]
}

/// Utility connection limits and import price.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Maximum import power (kW).
    pub max_import_kw: f64,
    /// Maximum export power (kW, positive magnitude).
    pub max_export_kw: f64,
    /// Price per imported kWh.
    pub import_price_per_kwh: f64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_import_kw: 0.0,
            max_export_kw: 0.0,
            import_price_per_kwh: 0.0,
        }
    }
}

/// Penalty prices for balance-resolution outcomes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriceConfig {
    /// Penalty per kWh of unserved load.
    pub load_shedding_per_kwh: f64,
    /// Penalty per kWh of wasted production.
    pub curtailment_per_kwh: f64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            load_shedding_per_kwh: 10.0,
            curtailment_per_kwh: 0.5,
        }
    }
}

/// Exogenous data source selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfig {
    /// Source kind: `"synthetic"` or `"csv"`.
    pub source: String,
    /// CSV path, required when `source = "csv"`.
    pub path: Option<PathBuf>,
    /// Baseline consumption for the synthetic profile (kW).
    pub base_kw: f64,
    /// Daily consumption swing amplitude (kW).
    pub amp_kw: f64,
    /// Phase offset of the consumption pattern (radians).
    pub phase_rad: f64,
    /// Gaussian noise standard deviation (kW).
    pub noise_std: f64,
    /// Peak renewable production (kW).
    pub pv_peak_kw: f64,
    /// Daylight window start (hours since midnight).
    pub sunrise_hour: f64,
    /// Daylight window end (hours since midnight).
    pub sunset_hour: f64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            source: "synthetic".to_string(),
            path: None,
            base_kw: 4.0,
            amp_kw: 2.0,
            phase_rad: 1.2,
            noise_std: 0.2,
            pv_peak_kw: 8.0,
            sunrise_hour: 6.0,
            sunset_hour: 18.0,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.period_minutes"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
}

impl ScenarioConfig {
    /// Returns the islanded baseline: one storage, no utility connection,
    /// synthetic data.
    pub fn islanded() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            storage: default_storages(),
            connection: ConnectionConfig::default(),
            prices: PriceConfig::default(),
            dataset: DatasetConfig::default(),
        }
    }

    /// Returns the grid-tied preset: an import/export-capable connection
    /// and a smaller storage, so dispatch trades storage cycling against
    /// import cost.
    pub fn grid_tied() -> Self {
        Self {
            storage: vec![StorageConfig {
                capacity_kwh: 20.0,
                max_soc_kwh: 20.0,
                initial_soc_kwh: 10.0,
                max_charge_kw: 6.0,
                max_discharge_kw: 6.0,
                ..StorageConfig::default()
            }],
            connection: ConnectionConfig {
                max_import_kw: 6.0,
                max_export_kw: 6.0,
                import_price_per_kwh: 0.3,
            },
            ..Self::islanded()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["islanded", "grid_tied"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "islanded" => Ok(Self::islanded()),
            "grid_tied" => Ok(Self::grid_tied()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is
    /// invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "scenario".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown
    /// fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.simulation;

        let start = parse_timestamp(&s.start);
        let end = parse_timestamp(&s.end);
        if start.is_err() {
            errors.push(ConfigError {
                field: "simulation.start".into(),
                message: format!("must match \"{TIMESTAMP_FORMAT}\", got \"{}\"", s.start),
            });
        }
        if end.is_err() {
            errors.push(ConfigError {
                field: "simulation.end".into(),
                message: format!("must match \"{TIMESTAMP_FORMAT}\", got \"{}\"", s.end),
            });
        }
        if let (Ok(start), Ok(end)) = (start, end)
            && start >= end
        {
            errors.push(ConfigError {
                field: "simulation.start".into(),
                message: "must be before simulation.end".into(),
            });
        }
        if s.period_minutes == 0 {
            errors.push(ConfigError {
                field: "simulation.period_minutes".into(),
                message: "must be > 0".into(),
            });
        }

        if self.storage.is_empty() {
            errors.push(ConfigError {
                field: "storage".into(),
                message: "at least one storage device is required".into(),
            });
        }
        for (i, st) in self.storage.iter().enumerate() {
            let field = |suffix: &str| format!("storage[{i}].{suffix}");
            if st.capacity_kwh <= 0.0 {
                errors.push(ConfigError {
                    field: field("capacity_kwh"),
                    message: "must be > 0".into(),
                });
            }
            if st.min_soc_kwh < 0.0
                || st.min_soc_kwh >= st.max_soc_kwh
                || st.max_soc_kwh > st.capacity_kwh
            {
                errors.push(ConfigError {
                    field: field("min_soc_kwh"),
                    message: "bounds must satisfy 0 <= min < max <= capacity".into(),
                });
            }
            if st.initial_soc_kwh < st.min_soc_kwh || st.initial_soc_kwh > st.max_soc_kwh {
                errors.push(ConfigError {
                    field: field("initial_soc_kwh"),
                    message: "must lie within the SOC bounds".into(),
                });
            }
            if st.max_charge_kw < 0.0 || st.max_discharge_kw < 0.0 {
                errors.push(ConfigError {
                    field: field("max_charge_kw"),
                    message: "rate limits must be >= 0".into(),
                });
            }
            for (name, eff) in [
                ("charge_efficiency", st.charge_efficiency),
                ("discharge_efficiency", st.discharge_efficiency),
            ] {
                if !(eff > 0.0 && eff <= 1.0) {
                    errors.push(ConfigError {
                        field: field(name),
                        message: "must be in (0.0, 1.0]".into(),
                    });
                }
            }
            if st.degradation_price_per_kwh < 0.0 {
                errors.push(ConfigError {
                    field: field("degradation_price_per_kwh"),
                    message: "must be >= 0".into(),
                });
            }
        }

        let c = &self.connection;
        if c.max_import_kw < 0.0 || c.max_export_kw < 0.0 || c.import_price_per_kwh < 0.0 {
            errors.push(ConfigError {
                field: "connection".into(),
                message: "limits and price must be >= 0".into(),
            });
        }

        let p = &self.prices;
        if p.load_shedding_per_kwh < 0.0 || p.curtailment_per_kwh < 0.0 {
            errors.push(ConfigError {
                field: "prices".into(),
                message: "penalty prices must be >= 0".into(),
            });
        }

        let d = &self.dataset;
        match d.source.as_str() {
            "synthetic" => {
                if !(d.sunrise_hour < d.sunset_hour && d.sunset_hour <= 24.0) {
                    errors.push(ConfigError {
                        field: "dataset.sunrise_hour".into(),
                        message: "daylight window must satisfy sunrise < sunset <= 24".into(),
                    });
                }
                if d.base_kw < 0.0 || d.pv_peak_kw < 0.0 || d.noise_std < 0.0 {
                    errors.push(ConfigError {
                        field: "dataset.base_kw".into(),
                        message: "profile magnitudes must be >= 0".into(),
                    });
                }
            }
            "csv" => {
                if d.path.is_none() {
                    errors.push(ConfigError {
                        field: "dataset.path".into(),
                        message: "required when dataset.source = \"csv\"".into(),
                    });
                }
            }
            other => {
                errors.push(ConfigError {
                    field: "dataset.source".into(),
                    message: format!("must be \"synthetic\" or \"csv\", got \"{other}\""),
                });
            }
        }

        errors
    }

    /// Builds the exogenous data source described by `[dataset]`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] on validation failures and dataset
    /// errors from CSV ingestion.
    pub fn build_data(&self) -> SimResult<TimeSeries> {
        let d = &self.dataset;
        match d.source.as_str() {
            "csv" => {
                let path = d
                    .path
                    .as_ref()
                    .ok_or_else(|| SimError::Config("dataset.path is required".into()))?;
                TimeSeries::from_csv_path(path)
            }
            _ => {
                let start = parse_timestamp(&self.simulation.start)
                    .map_err(|e| SimError::Config(format!("simulation.start: {e}")))?;
                let end = parse_timestamp(&self.simulation.end)
                    .map_err(|e| SimError::Config(format!("simulation.end: {e}")))?;
                let period = i64::from(self.simulation.period_minutes);
                let minutes = (end - start).num_minutes();
                let steps = (minutes + period - 1) / period;
                let profile = SyntheticProfile {
                    base_kw: d.base_kw,
                    amp_kw: d.amp_kw,
                    phase_rad: d.phase_rad,
                    noise_std: d.noise_std,
                    pv_peak_kw: d.pv_peak_kw,
                    sunrise_hour: d.sunrise_hour,
                    sunset_hour: d.sunset_hour,
                };
                TimeSeries::synthetic(
                    start,
                    self.simulation.period_minutes,
                    steps as usize + 1,
                    &profile,
                    self.simulation.seed,
                )
            }
        }
    }

    /// Builds the [`Grid`] described by `[storage]`, `[connection]`, and
    /// `[prices]`.
    pub fn build_grid(&self) -> Grid {
        let storages = self
            .storage
            .iter()
            .map(|st| {
                StorageDevice::new(
                    st.name.clone(),
                    st.capacity_kwh,
                    st.min_soc_kwh,
                    st.max_soc_kwh,
                    st.initial_soc_kwh,
                    st.max_charge_kw,
                    st.max_discharge_kw,
                    st.charge_efficiency,
                    st.discharge_efficiency,
                    st.degradation_price_per_kwh,
                )
            })
            .collect();
        let connection = UtilityConnection::new(
            self.connection.max_import_kw,
            self.connection.max_export_kw,
            self.connection.import_price_per_kwh,
        );
        Grid::new(
            storages,
            connection,
            self.prices.load_shedding_per_kwh,
            self.prices.curtailment_per_kwh,
        )
    }

    /// Validates the scenario and builds a ready-to-run [`Simulator`].
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] listing every validation failure, or
    /// the construction errors of the simulator itself.
    pub fn build(&self) -> SimResult<Simulator> {
        let errors = self.validate();
        if !errors.is_empty() {
            let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(SimError::Config(joined.join("; ")));
        }

        let start = parse_timestamp(&self.simulation.start)
            .map_err(|e| SimError::Config(format!("simulation.start: {e}")))?;
        let end = parse_timestamp(&self.simulation.end)
            .map_err(|e| SimError::Config(format!("simulation.end: {e}")))?;
        let data = Arc::new(self.build_data()?);
        Simulator::new(start, end, self.simulation.period_minutes, self.build_grid(), data)
    }
}
