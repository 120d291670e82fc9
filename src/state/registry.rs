//! The exchange registry: extension table and registration lifecycle.
//!
//! One mutex guards the table, its occupancy, and the accepting flag
//! together, so the capacity check, the shutdown gate, and insertion are
//! a single critical section. The table lock is never held while a unit
//! lock is taken or across an await: lookups clone out the `Arc` and
//! release before any unit-level transition runs.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::Mutex;
use pbx_proto::TuState;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::metrics;

use super::tu::TelephoneUnit;

/// The switchboard: maps extensions to registered telephone units and
/// coordinates drain-on-shutdown.
pub struct Pbx {
    max_extensions: usize,
    table: Mutex<SwitchTable>,
    /// Signalled whenever the table empties; shutdown waits on it.
    drained: Notify,
}

struct SwitchTable {
    entries: HashMap<u32, Arc<TelephoneUnit>>,
    accepting: bool,
}

impl Pbx {
    /// Create a switchboard with room for `max_extensions` units.
    pub fn new(max_extensions: usize) -> Pbx {
        Pbx {
            max_extensions,
            table: Mutex::new(SwitchTable {
                entries: HashMap::new(),
                accepting: true,
            }),
            drained: Notify::new(),
        }
    }

    /// Number of currently registered extensions.
    pub fn count(&self) -> usize {
        self.table.lock().entries.len()
    }

    /// Plug a unit into the switchboard at the given extension.
    ///
    /// On success the registry retains a reference for as long as the
    /// unit stays registered, and the unit is told its extension; that
    /// notification is the unit's first reply line.
    pub fn register(&self, tu: &Arc<TelephoneUnit>, extension: u32) -> Result<(), RegistryError> {
        if tu.extension().is_some() {
            return Err(RegistryError::AlreadyRegistered);
        }
        let registered = {
            let mut table = self.table.lock();
            if !table.accepting {
                return Err(RegistryError::ShuttingDown);
            }
            if table.entries.len() >= self.max_extensions {
                return Err(RegistryError::Exhausted(self.max_extensions));
            }
            match table.entries.entry(extension) {
                Entry::Occupied(_) => return Err(RegistryError::ExtensionInUse(extension)),
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(tu));
                }
            }
            table.entries.len()
        };
        // Extension assignment and its notification run outside the
        // table lock; this is the one path out of "unassigned".
        tu.assign_extension(extension);
        metrics::set_registered_extensions(registered as i64);
        debug!(extension, "extension registered");
        Ok(())
    }

    /// Unplug a unit, cancelling any call it was in.
    ///
    /// At most one caller finds the entry; a second concurrent attempt
    /// reports `NotRegistered`.
    pub fn unregister(&self, tu: &Arc<TelephoneUnit>) -> Result<(), RegistryError> {
        let Some(extension) = tu.extension() else {
            return Err(RegistryError::NotRegistered);
        };
        let (removed, remaining) = {
            let mut table = self.table.lock();
            match table.entries.get(&extension) {
                Some(entry) if Arc::ptr_eq(entry, tu) => {}
                _ => return Err(RegistryError::NotRegistered),
            }
            let removed = table.entries.remove(&extension);
            (removed, table.entries.len())
        };
        // Teardown runs outside the table lock: mark the unit
        // unreachable for dialers, then force it on hook so no peer is
        // left dangling.
        tu.detach();
        tu.hangup();
        metrics::set_registered_extensions(remaining as i64);
        debug!(extension, "extension unregistered");
        drop(removed);
        if remaining == 0 {
            self.drained.notify_waiters();
        }
        Ok(())
    }

    /// Route a dial from `tu` to an extension.
    ///
    /// The table lock is released before the unit-level transition runs;
    /// the pair-locked re-validation inside [`TelephoneUnit::dial`] is
    /// authoritative, so a target vanishing after lookup is tolerated.
    pub fn dial(&self, tu: &Arc<TelephoneUnit>, extension: Option<u32>) -> TuState {
        let target = extension.and_then(|extension| {
            let table = self.table.lock();
            table.entries.get(&extension).cloned()
        });
        tu.dial(target)
    }

    /// Drain the switchboard.
    ///
    /// Stops accepting registrations, forces every registered session's
    /// transport closed, then waits until each owning session has
    /// unregistered its unit. The table lock is never held across the
    /// wait.
    pub async fn shutdown(&self) {
        let units: Vec<Arc<TelephoneUnit>> = {
            let mut table = self.table.lock();
            table.accepting = false;
            table.entries.values().map(Arc::clone).collect()
        };
        info!(sessions = units.len(), "Draining registered extensions");
        for tu in &units {
            tu.session().force_close();
        }
        drop(units);
        loop {
            let mut drained = std::pin::pin!(self.drained.notified());
            // Register for the wakeup before checking, so an unregister
            // landing in between is not lost.
            drained.as_mut().enable();
            if self.table.lock().entries.is_empty() {
                break;
            }
            drained.await;
        }
        info!("All extensions unregistered");
    }
}
