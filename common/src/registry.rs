use tracing::{debug, info, warn};

use crate::error::{CommandError, StoreError};
use crate::furnace::OutputAction;
use crate::layout::ModeType;
use crate::modes::arbiter::ArbitrationPolicy;
use crate::modes::ModeController;
use crate::store::{Eeprom, SettingsStore};

/// Owns the one live controller and the (type, slot) it was loaded from.
#[derive(Debug, Clone)]
pub struct ActiveModeRegistry {
    mode_type: ModeType,
    slot: u8,
    controller: ModeController,
    policy: ArbitrationPolicy,
}

impl ActiveModeRegistry {
    /// PassThrough with its built-in settings.
    pub fn new(policy: ArbitrationPolicy, now_ms: u64) -> Self {
        let mut controller = ModeController::new(ModeType::PassThrough, policy);
        controller.initialize_state(now_ms);
        Self {
            mode_type: ModeType::PassThrough,
            slot: 0,
            controller,
            policy,
        }
    }

    /// Activates the persisted selector if it names a configured slot, and
    /// stays in PassThrough otherwise. The furnace is turned off either way.
    pub fn restore<E: Eeprom>(
        store: &SettingsStore<E>,
        policy: ArbitrationPolicy,
        now_ms: u64,
    ) -> Result<(Self, Vec<OutputAction>), StoreError> {
        let mut registry = Self::new(policy, now_ms);

        match store.active_mode()? {
            Some((mode_type, slot)) => {
                registry.activate(mode_type, slot, now_ms);
                info!(%mode_type, slot, "restored active mode");
            }
            None => info!("no active mode persisted, using PASSTHROUGH"),
        }
        registry.load_or_keep_defaults(store);

        let off = registry.controller.turn_furnace_off();
        Ok((registry, vec![off]))
    }

    pub fn active(&self) -> (ModeType, u8) {
        (self.mode_type, self.slot)
    }

    pub fn controller(&self) -> &ModeController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ModeController {
        &mut self.controller
    }

    /// Persists the selector, resets a fresh controller, loads its record
    /// and forces the outputs safe, in that order.
    pub fn switch<E: Eeprom>(
        &mut self,
        store: &mut SettingsStore<E>,
        mode_type: ModeType,
        slot: i32,
        now_ms: u64,
    ) -> Result<Vec<OutputAction>, CommandError> {
        let count = store.slot_count(mode_type)?;
        let slot = u8::try_from(slot)
            .ok()
            .filter(|slot| *slot < count)
            .ok_or(CommandError::SlotOutOfRange {
                mode_type,
                slot,
                count,
            })?;

        if (mode_type, slot) == self.active() {
            debug!(%mode_type, slot, "mode already active");
            return Ok(Vec::new());
        }

        store.set_active_mode(mode_type, slot)?;
        self.activate(mode_type, slot, now_ms);
        self.load_or_keep_defaults(store);
        debug!(%mode_type, slot, name = %self.controller.name(), "switched mode");

        Ok(vec![self.controller.turn_furnace_off()])
    }

    /// Overwrites the live settings with the persisted record, if any.
    pub fn load_settings<E: Eeprom>(&mut self, store: &SettingsStore<E>) -> Result<bool, StoreError> {
        match store.load(self.mode_type, self.slot)? {
            Some(record) => Ok(self.controller.load_settings(record)),
            None => Ok(false),
        }
    }

    /// Returns the address the record was written at.
    pub fn commit<E: Eeprom>(&self, store: &mut SettingsStore<E>) -> Result<usize, StoreError> {
        let addr = store.save(self.slot, &self.controller.settings())?;
        debug!(mode_type = %self.mode_type, slot = self.slot, addr, "committed settings");
        Ok(addr)
    }

    fn activate(&mut self, mode_type: ModeType, slot: u8, now_ms: u64) {
        let mut controller = ModeController::new(mode_type, self.policy);
        controller.initialize_state(now_ms);
        self.controller = controller;
        self.mode_type = mode_type;
        self.slot = slot;
    }

    fn load_or_keep_defaults<E: Eeprom>(&mut self, store: &SettingsStore<E>) {
        if let Err(err) = self.load_settings(store) {
            warn!(mode_type = %self.mode_type, slot = self.slot, %err, "keeping default settings");
        }
    }
}
