//! Discrete dispatch actions and their decoding into power setpoints.

use crate::error::{SimError, SimResult};
use crate::sim::grid::Grid;

/// Per-device dispatch instruction for one decision interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageDispatch {
    /// Charge at the device's maximum charge rate.
    ChargeAtMax,
    /// Discharge at the device's maximum discharge rate.
    DischargeAtMax,
    /// Request zero power.
    Idle,
}

/// Digit order of the per-device vocabulary. `Idle` is last so that the
/// highest action index is the all-idle dispatch.
const VOCABULARY: [StorageDispatch; 3] = [
    StorageDispatch::ChargeAtMax,
    StorageDispatch::DischargeAtMax,
    StorageDispatch::Idle,
];

impl StorageDispatch {
    /// Requested power for `device` under this instruction, in the
    /// positive-charge sign convention.
    pub fn requested_kw(self, device: &crate::devices::StorageDevice) -> f64 {
        match self {
            StorageDispatch::ChargeAtMax => device.max_charge_kw,
            StorageDispatch::DischargeAtMax => -device.max_discharge_kw,
            StorageDispatch::Idle => 0.0,
        }
    }
}

/// Maps a discrete action index onto one dispatch instruction per storage.
///
/// The action space is the full cross product of the per-device vocabulary:
/// with `n` storages there are `3^n` actions. An index is read as an
/// `n`-digit base-3 number, most significant digit first, so device order
/// in the [`Grid`] fixes the mapping. Decoding is pure and total over
/// `[0, num_actions)`.
#[derive(Debug, Clone, Copy)]
pub struct ActionDecoder {
    num_storages: usize,
    num_actions: usize,
}

impl ActionDecoder {
    /// Creates a decoder for a fleet of `num_storages` devices.
    ///
    /// # Panics
    ///
    /// Panics if `num_storages` is zero.
    pub fn new(num_storages: usize) -> Self {
        assert!(num_storages > 0, "action space needs at least one storage");
        let num_actions = VOCABULARY
            .len()
            .checked_pow(num_storages as u32)
            .expect("action space size overflow");
        Self {
            num_storages,
            num_actions,
        }
    }

    /// Size of the discrete action space.
    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// The all-idle action, by construction the last index.
    pub fn idle_action(&self) -> usize {
        self.num_actions - 1
    }

    /// Decodes an action index into one instruction per storage.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidAction`] for indices outside
    /// `[0, num_actions)`.
    pub fn decode(&self, action: usize) -> SimResult<Vec<StorageDispatch>> {
        if action >= self.num_actions {
            return Err(SimError::InvalidAction {
                action,
                num_actions: self.num_actions,
            });
        }

        let base = VOCABULARY.len();
        let mut digits = Vec::with_capacity(self.num_storages);
        let mut remainder = action;
        let mut weight = self.num_actions / base;
        for _ in 0..self.num_storages {
            digits.push(VOCABULARY[remainder / weight]);
            remainder %= weight;
            weight = (weight / base).max(1);
        }
        Ok(digits)
    }

    /// Inverse of [`Self::decode`].
    pub fn encode(&self, dispatches: &[StorageDispatch]) -> usize {
        assert_eq!(dispatches.len(), self.num_storages);
        dispatches.iter().fold(0, |acc, d| {
            let digit = VOCABULARY.iter().position(|v| v == d).expect("vocabulary");
            acc * VOCABULARY.len() + digit
        })
    }

    /// Decodes an action into requested power per storage, in grid order.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidAction`] for out-of-range indices.
    pub fn requested_powers(&self, action: usize, grid: &Grid) -> SimResult<Vec<f64>> {
        debug_assert_eq!(grid.num_storages(), self.num_storages);
        let dispatches = self.decode(action)?;
        Ok(dispatches
            .iter()
            .zip(grid.storages())
            .map(|(dispatch, device)| dispatch.requested_kw(device))
            .collect())
    }
}
