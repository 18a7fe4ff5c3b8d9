//! Grid topology: the storage fleet, the utility connection, and the
//! penalty prices used by the power-balance resolution.

use crate::devices::StorageDevice;

/// Point of common coupling with the utility.
///
/// Import covers deficits at a fuel/energy price; export absorbs surplus
/// for free up to its limit. An islanded grid uses zero limits so every
/// deficit sheds and every surplus curtails.
#[derive(Debug, Clone)]
pub struct UtilityConnection {
    max_import_kw: f64,
    max_export_kw: f64,
    import_price_per_kwh: f64,
}

impl UtilityConnection {
    /// Creates a connection with the given power limits and import price.
    ///
    /// # Panics
    ///
    /// Panics if a limit or the price is negative.
    pub fn new(max_import_kw: f64, max_export_kw: f64, import_price_per_kwh: f64) -> Self {
        assert!(max_import_kw >= 0.0);
        assert!(max_export_kw >= 0.0);
        assert!(import_price_per_kwh >= 0.0);

        Self {
            max_import_kw,
            max_export_kw,
            import_price_per_kwh,
        }
    }

    /// A connection that can neither import nor export.
    pub fn islanded() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Maximum import (deficit-covering) power in kW.
    pub fn max_import_kw(&self) -> f64 {
        self.max_import_kw
    }

    /// Maximum export (surplus-absorbing) power in kW.
    pub fn max_export_kw(&self) -> f64 {
        self.max_export_kw
    }

    /// Price paid per imported kWh.
    pub fn import_price_per_kwh(&self) -> f64 {
        self.import_price_per_kwh
    }
}

/// Static microgrid topology.
///
/// The storage order is insertion-stable and defines the mapping between
/// decoded action setpoints and devices; it never changes after
/// construction.
#[derive(Debug, Clone)]
pub struct Grid {
    storages: Vec<StorageDevice>,
    connection: UtilityConnection,
    load_shedding_price_per_kwh: f64,
    curtailment_price_per_kwh: f64,
}

impl Grid {
    /// Creates a grid from its storage fleet, utility connection, and
    /// penalty prices.
    ///
    /// # Panics
    ///
    /// Panics if `storages` is empty or a penalty price is negative.
    pub fn new(
        storages: Vec<StorageDevice>,
        connection: UtilityConnection,
        load_shedding_price_per_kwh: f64,
        curtailment_price_per_kwh: f64,
    ) -> Self {
        assert!(!storages.is_empty(), "grid needs at least one storage");
        assert!(load_shedding_price_per_kwh >= 0.0);
        assert!(curtailment_price_per_kwh >= 0.0);

        Self {
            storages,
            connection,
            load_shedding_price_per_kwh,
            curtailment_price_per_kwh,
        }
    }

    /// Storage devices in action-mapping order.
    pub fn storages(&self) -> &[StorageDevice] {
        &self.storages
    }

    /// Number of storage devices.
    pub fn num_storages(&self) -> usize {
        self.storages.len()
    }

    /// The utility connection.
    pub fn connection(&self) -> &UtilityConnection {
        &self.connection
    }

    /// Penalty per kWh of unserved load.
    pub fn load_shedding_price_per_kwh(&self) -> f64 {
        self.load_shedding_price_per_kwh
    }

    /// Penalty per kWh of wasted renewable production.
    pub fn curtailment_price_per_kwh(&self) -> f64 {
        self.curtailment_price_per_kwh
    }

    /// SOC values at episode start, in storage order.
    pub fn initial_socs(&self) -> Vec<f64> {
        self.storages.iter().map(|s| s.initial_soc_kwh).collect()
    }

    /// Sum of all storage capacities in kWh.
    pub fn total_storage_capacity_kwh(&self) -> f64 {
        self.storages.iter().map(|s| s.capacity_kwh).sum()
    }
}
