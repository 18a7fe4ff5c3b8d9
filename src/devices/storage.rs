/// A storage unit (battery) that can absorb and release energy.
///
/// `StorageDevice` is pure static configuration: capacity, state-of-charge
/// bounds, power rate limits, asymmetric round-trip efficiency, and a
/// throughput-based degradation price. The SOC itself lives in the
/// simulation state; [`StorageDevice::apply`] is a pure transition from one
/// SOC to the next.
///
/// # Power Flow Convention
/// - Positive power: Charging (load on the bus)
/// - Negative power: Discharging (generation on the bus)
#[derive(Debug, Clone)]
pub struct StorageDevice {
    /// Device name used in logs and telemetry columns.
    pub name: String,

    /// Total energy capacity in kilowatt-hours.
    pub capacity_kwh: f64,

    /// Lower state-of-charge bound in kWh.
    pub min_soc_kwh: f64,

    /// Upper state-of-charge bound in kWh.
    pub max_soc_kwh: f64,

    /// State of charge at episode start in kWh.
    pub initial_soc_kwh: f64,

    /// Maximum charge power in kilowatts (positive value).
    pub max_charge_kw: f64,

    /// Maximum discharge power in kilowatts (positive value).
    pub max_discharge_kw: f64,

    /// Charging efficiency (0..1.0). Stored energy is the charged energy
    /// multiplied by this factor.
    pub charge_efficiency: f64,

    /// Discharging efficiency (0..1.0). Delivered energy draws
    /// `delivered / efficiency` from the store.
    pub discharge_efficiency: f64,

    /// Aging cost per kWh of throughput.
    pub degradation_price_per_kwh: f64,
}

/// Result of applying one decision interval of power to a storage device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageTransition {
    /// Power actually absorbed (+) or delivered (-), after clipping, in kW.
    pub achieved_kw: f64,
    /// State of charge after the interval, in kWh.
    pub new_soc_kwh: f64,
    /// Throughput-based aging cost for the interval.
    pub degradation_cost: f64,
}

impl StorageDevice {
    /// Creates a new storage device with the specified parameters.
    ///
    /// # Panics
    ///
    /// Panics if the capacity is not positive, the SOC bounds are not
    /// ordered within `[0, capacity]`, the initial SOC violates the bounds,
    /// a rate limit is negative, or an efficiency is outside `(0, 1]`.
    /// Scenario validation reports these constraints before construction.
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        capacity_kwh: f64,
        min_soc_kwh: f64,
        max_soc_kwh: f64,
        initial_soc_kwh: f64,
        max_charge_kw: f64,
        max_discharge_kw: f64,
        charge_efficiency: f64,
        discharge_efficiency: f64,
        degradation_price_per_kwh: f64,
    ) -> Self {
        assert!(capacity_kwh > 0.0);
        assert!(0.0 <= min_soc_kwh && min_soc_kwh < max_soc_kwh && max_soc_kwh <= capacity_kwh);
        assert!((min_soc_kwh..=max_soc_kwh).contains(&initial_soc_kwh));
        assert!(max_charge_kw >= 0.0 && max_discharge_kw >= 0.0);
        assert!(charge_efficiency > 0.0 && charge_efficiency <= 1.0);
        assert!(discharge_efficiency > 0.0 && discharge_efficiency <= 1.0);
        assert!(degradation_price_per_kwh >= 0.0);

        Self {
            name: name.into(),
            capacity_kwh,
            min_soc_kwh,
            max_soc_kwh,
            initial_soc_kwh,
            max_charge_kw,
            max_discharge_kw,
            charge_efficiency,
            discharge_efficiency,
            degradation_price_per_kwh,
        }
    }

    /// Applies a requested power for one interval and returns the clipped
    /// outcome.
    ///
    /// The request is first limited to the rate envelope
    /// `[-max_discharge_kw, max_charge_kw]`, then further clipped so the
    /// resulting SOC stays inside `[min_soc_kwh, max_soc_kwh]` once
    /// efficiency is applied. Clipping is the feasibility mechanism: there
    /// is no failure path.
    ///
    /// # Arguments
    ///
    /// * `soc_kwh` - State of charge entering the interval
    /// * `requested_kw` - Requested power (positive = charge)
    /// * `dt_hours` - Interval length in hours
    pub fn apply(&self, soc_kwh: f64, requested_kw: f64, dt_hours: f64) -> StorageTransition {
        let rate_limited_kw = requested_kw.clamp(-self.max_discharge_kw, self.max_charge_kw);

        let achieved_kw = if rate_limited_kw > 0.0 {
            // Charging: stored energy is achieved * dt * eta_c, bounded by headroom
            let headroom_kwh = (self.max_soc_kwh - soc_kwh).max(0.0);
            let max_kw = headroom_kwh / (dt_hours * self.charge_efficiency);
            rate_limited_kw.min(max_kw)
        } else if rate_limited_kw < 0.0 {
            // Discharging: delivered energy draws delivered / eta_d from the store
            let available_kwh = (soc_kwh - self.min_soc_kwh).max(0.0);
            let max_kw = available_kwh * self.discharge_efficiency / dt_hours;
            rate_limited_kw.max(-max_kw)
        } else {
            0.0
        };

        let new_soc_kwh = if achieved_kw >= 0.0 {
            soc_kwh + achieved_kw * dt_hours * self.charge_efficiency
        } else {
            soc_kwh + achieved_kw * dt_hours / self.discharge_efficiency
        };

        StorageTransition {
            achieved_kw,
            new_soc_kwh: new_soc_kwh.clamp(self.min_soc_kwh, self.max_soc_kwh),
            degradation_cost: achieved_kw.abs() * dt_hours * self.degradation_price_per_kwh,
        }
    }
}
