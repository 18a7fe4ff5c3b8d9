//! Exogenous generation/load data feeding the simulation.
//!
//! The simulator never produces these signals itself: consumption and
//! renewable production come from a read-only, time-indexed [`TimeSeries`]
//! that is loaded once and shared across rollouts.

use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::{SimError, SimResult};

/// Timestamp format accepted by configuration files and CSV datasets.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One exogenous observation: realized consumption and renewable production.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExogenousSample {
    /// Aggregate load in kW (non-negative).
    pub consumption_kw: f64,
    /// Renewable production in kW (non-negative).
    pub production_kw: f64,
}

/// A read-only, regularly sampled consumption/production series.
///
/// Lookups floor an arbitrary timestamp to the sample interval containing
/// it, so the decision interval of a simulation does not have to match the
/// sampling period of the data.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    start: NaiveDateTime,
    period_minutes: i64,
    samples: Vec<ExogenousSample>,
}

impl TimeSeries {
    /// Creates a series starting at `start` with one sample every
    /// `period_minutes`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Dataset`] if `samples` is empty or
    /// `period_minutes` is zero.
    pub fn new(
        start: NaiveDateTime,
        period_minutes: u32,
        samples: Vec<ExogenousSample>,
    ) -> SimResult<Self> {
        if samples.is_empty() {
            return Err(SimError::Dataset("series contains no samples".into()));
        }
        if period_minutes == 0 {
            return Err(SimError::Dataset("sampling period must be > 0".into()));
        }
        Ok(Self {
            start,
            period_minutes: i64::from(period_minutes),
            samples,
        })
    }

    /// Parses a series from a CSV file with columns
    /// `timestamp,consumption_kw,production_kw`.
    ///
    /// The sampling period is inferred from the first two rows; rows must
    /// be contiguous and in chronological order.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Io`] when the file cannot be opened and
    /// [`SimError::Dataset`] for malformed content.
    pub fn from_csv_path(path: &Path) -> SimResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Parses a series from any CSV reader (see [`Self::from_csv_path`]).
    pub fn from_csv_reader(reader: impl std::io::Read) -> SimResult<Self> {
        let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
        let mut timestamps = Vec::new();
        let mut samples = Vec::new();

        for record in rdr.records() {
            let record = record.map_err(|e| SimError::Dataset(e.to_string()))?;
            if record.len() < 3 {
                return Err(SimError::Dataset(format!(
                    "expected 3 columns, found {}",
                    record.len()
                )));
            }
            let timestamp = NaiveDateTime::parse_from_str(record[0].trim(), TIMESTAMP_FORMAT)
                .map_err(|e| SimError::Dataset(format!("bad timestamp {:?}: {e}", &record[0])))?;
            let consumption_kw: f64 = record[1]
                .trim()
                .parse()
                .map_err(|e| SimError::Dataset(format!("bad consumption {:?}: {e}", &record[1])))?;
            let production_kw: f64 = record[2]
                .trim()
                .parse()
                .map_err(|e| SimError::Dataset(format!("bad production {:?}: {e}", &record[2])))?;
            timestamps.push(timestamp);
            samples.push(ExogenousSample {
                consumption_kw,
                production_kw,
            });
        }

        if samples.len() < 2 {
            return Err(SimError::Dataset(
                "series needs at least two rows to infer its period".into(),
            ));
        }

        let period = timestamps[1] - timestamps[0];
        let period_minutes = period.num_minutes();
        if period_minutes <= 0 {
            return Err(SimError::Dataset(
                "rows must be in strictly increasing chronological order".into(),
            ));
        }
        for (i, pair) in timestamps.windows(2).enumerate() {
            if pair[1] - pair[0] != period {
                return Err(SimError::Dataset(format!(
                    "irregular sampling period at row {}",
                    i + 1
                )));
            }
        }

        Self::new(
            timestamps[0],
            u32::try_from(period_minutes)
                .map_err(|_| SimError::Dataset("sampling period too large".into()))?,
            samples,
        )
    }

    /// Builds a deterministic synthetic series from a daily profile.
    ///
    /// Consumption follows a sinusoidal daily pattern with optional
    /// Gaussian noise; production is a half-sine bump inside the daylight
    /// window. Both are clamped to be non-negative. The same seed always
    /// produces the same series.
    pub fn synthetic(
        start: NaiveDateTime,
        period_minutes: u32,
        num_samples: usize,
        profile: &SyntheticProfile,
        seed: u64,
    ) -> SimResult<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let minutes_per_day = 24.0 * 60.0;
        let mut samples = Vec::with_capacity(num_samples);

        for i in 0..num_samples {
            let minute_of_day =
                (i as f64 * f64::from(period_minutes)).rem_euclid(minutes_per_day);
            let day_pos = minute_of_day / minutes_per_day; // [0, 1)
            let angle = 2.0 * std::f64::consts::PI * day_pos + profile.phase_rad;
            let consumption_kw = (profile.base_kw
                + profile.amp_kw * angle.sin()
                + gaussian_noise(&mut rng, profile.noise_std))
            .max(0.0);

            let hour = minute_of_day / 60.0;
            let production_kw = if hour >= profile.sunrise_hour && hour < profile.sunset_hour {
                let span = profile.sunset_hour - profile.sunrise_hour;
                let sun_pos = (hour - profile.sunrise_hour) / span;
                (profile.pv_peak_kw * (std::f64::consts::PI * sun_pos).sin()
                    + gaussian_noise(&mut rng, profile.noise_std))
                .max(0.0)
            } else {
                0.0
            };

            samples.push(ExogenousSample {
                consumption_kw,
                production_kw,
            });
        }

        Self::new(start, period_minutes, samples)
    }

    /// First covered timestamp.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Last covered timestamp (inclusive).
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::minutes(self.period_minutes * (self.samples.len() as i64 - 1))
    }

    /// Number of samples in the series.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`: construction rejects empty series.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns `true` when `[start, end]` lies entirely inside the series.
    pub fn covers(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start >= self.start && end <= self.end()
    }

    /// Sample whose interval contains `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTimeRange`] when the timestamp falls
    /// outside the series.
    pub fn sample_at(&self, timestamp: NaiveDateTime) -> SimResult<ExogenousSample> {
        let minutes = (timestamp - self.start).num_minutes();
        if minutes < 0 {
            return Err(SimError::InvalidTimeRange {
                reason: format!("{timestamp} precedes series start {}", self.start),
            });
        }
        let index = (minutes / self.period_minutes) as usize;
        self.samples
            .get(index)
            .copied()
            .ok_or_else(|| SimError::InvalidTimeRange {
                reason: format!("{timestamp} is past series end {}", self.end()),
            })
    }

    /// Like [`Self::sample_at`] but clamps out-of-range timestamps to the
    /// nearest boundary sample instead of failing.
    pub fn sample_at_clamped(&self, timestamp: NaiveDateTime) -> ExogenousSample {
        let minutes = (timestamp - self.start).num_minutes().max(0);
        let index = ((minutes / self.period_minutes) as usize).min(self.samples.len() - 1);
        self.samples[index]
    }

    /// `(min, max)` consumption over the whole series.
    pub fn consumption_bounds(&self) -> (f64, f64) {
        bounds(self.samples.iter().map(|s| s.consumption_kw))
    }

    /// `(min, max)` production over the whole series.
    pub fn production_bounds(&self) -> (f64, f64) {
        bounds(self.samples.iter().map(|s| s.production_kw))
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Daily-profile parameters for [`TimeSeries::synthetic`].
#[derive(Debug, Clone)]
pub struct SyntheticProfile {
    /// Baseline consumption in kW.
    pub base_kw: f64,
    /// Amplitude of the sinusoidal daily consumption swing in kW.
    pub amp_kw: f64,
    /// Phase offset of the consumption pattern in radians.
    pub phase_rad: f64,
    /// Standard deviation of Gaussian noise applied to both signals in kW.
    pub noise_std: f64,
    /// Peak renewable production in kW.
    pub pv_peak_kw: f64,
    /// Daylight window start, in hours since midnight.
    pub sunrise_hour: f64,
    /// Daylight window end, in hours since midnight.
    pub sunset_hour: f64,
}

/// Gaussian noise via the Box-Muller transform.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}
