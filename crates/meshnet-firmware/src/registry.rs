//! The node's device list.

use crate::items::{Item, ItemKind, MAX_ITEMS};
use crate::RegistryError;
use meshnet_common::Hardware;
use meshnet_packet::Envelope;

/// Configured devices plus a pending-report flag per device.
///
/// Device ids are indices into the list, assigned in configuration order.
#[derive(Debug, Clone)]
pub struct ItemRegistry {
    items: Vec<Item>,
    pending: Vec<bool>,
    max_items: usize,
}

impl Default for ItemRegistry {
    fn default() -> Self {
        Self::new(MAX_ITEMS)
    }
}

impl ItemRegistry {
    /// Create an empty registry holding at most `max_items` devices.
    pub fn new(max_items: usize) -> Self {
        let max_items = max_items.min(MAX_ITEMS);
        ItemRegistry {
            items: Vec::with_capacity(max_items),
            pending: Vec::with_capacity(max_items),
            max_items,
        }
    }

    /// Decode a configuration record and append the device.
    ///
    /// Fails without touching the list if the registry is full, the variant
    /// tag is unknown or the record is truncated.
    pub fn configure<H: Hardware>(
        &mut self,
        cfg: &mut Envelope,
        hw: &mut H,
    ) -> Result<u8, RegistryError> {
        if self.items.len() >= self.max_items {
            return Err(RegistryError::RegistryFull {
                max: self.max_items,
            });
        }
        let kind = ItemKind::try_from(cfg.get_byte()?)?;
        let item = Item::decode(kind, cfg, hw)?;

        let id = self.items.len() as u8;
        log::debug!("configured device {} as {} '{}'", id, kind, item.name());
        self.items.push(item);
        self.pending.push(false);
        Ok(id)
    }

    /// Read a device id, apply the following state bytes and mark the device pending.
    pub fn apply_state<H: Hardware>(
        &mut self,
        msg: &mut Envelope,
        hw: &mut H,
    ) -> Result<u8, RegistryError> {
        let id = msg.get_byte()?;
        let index = self.index(id)?;
        self.items[index].apply_state(msg, hw)?;
        self.pending[index] = true;
        Ok(id)
    }

    /// Read a device id and mark it pending without changing its value.
    pub fn mark_pending(&mut self, msg: &mut Envelope) -> Result<u8, RegistryError> {
        let id = msg.get_byte()?;
        self.mark_pending_id(id)?;
        Ok(id)
    }

    /// Mark device `id` pending.
    pub fn mark_pending_id(&mut self, id: u8) -> Result<(), RegistryError> {
        let index = self.index(id)?;
        self.pending[index] = true;
        Ok(())
    }

    /// Scan every device once and flag the ones whose hardware moved.
    ///
    /// Returns the number of newly flagged devices.
    pub fn poll_changes<H: Hardware>(&mut self, hw: &mut H) -> usize {
        let mut flagged = 0;
        for (item, pending) in self.items.iter().zip(self.pending.iter_mut()) {
            if !*pending && item.has_changed(hw) {
                *pending = true;
                flagged += 1;
            }
        }
        flagged
    }

    /// Write the lowest-indexed pending device's id and state into `out`.
    ///
    /// The pending flag is cleared only once the state has been written.
    /// Returns `Ok(None)` with `out` untouched when nothing is pending.
    pub fn next_pending<H: Hardware>(
        &mut self,
        out: &mut Envelope,
        hw: &mut H,
    ) -> Result<Option<u8>, RegistryError> {
        let Some(index) = self.pending.iter().position(|&p| p) else {
            return Ok(None);
        };
        let id = index as u8;
        out.set_byte(id)?;
        self.items[index].read_state(out, hw)?;
        self.pending[index] = false;
        Ok(Some(id))
    }

    /// Drop every device.
    pub fn clear(&mut self) {
        self.items.clear();
        self.pending.clear();
    }

    /// Number of configured devices.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no device is configured.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Device limit.
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Whether any device waits to be reported.
    pub fn has_pending(&self) -> bool {
        self.pending.iter().any(|&p| p)
    }

    /// Whether device `id` waits to be reported.
    pub fn is_pending(&self, id: u8) -> bool {
        self.pending.get(id as usize).copied().unwrap_or(false)
    }

    /// Device `id`, if configured.
    pub fn get(&self, id: u8) -> Option<&Item> {
        self.items.get(id as usize)
    }

    /// All devices in id order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    fn index(&self, id: u8) -> Result<usize, RegistryError> {
        let index = id as usize;
        if index < self.items.len() {
            Ok(index)
        } else {
            Err(RegistryError::UnknownDeviceId(id))
        }
    }
}
