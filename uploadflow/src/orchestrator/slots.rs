//! Index-addressed storage for item outcomes.

use parking_lot::Mutex;

use crate::core::ItemOutcome;
use crate::errors::InvariantViolation;

/// One slot per submitted item, filled as items settle in any order.
#[derive(Debug)]
pub(crate) struct OutcomeSlots {
    slots: Mutex<Vec<Option<ItemOutcome>>>,
}

impl OutcomeSlots {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; len]),
        }
    }

    /// Stores an outcome at its own index. A slot is written at most once.
    pub(crate) fn record(&self, outcome: ItemOutcome) -> Result<(), InvariantViolation> {
        let index = outcome.index;
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(index).ok_or_else(|| {
            InvariantViolation::new(format!("outcome index {index} is outside the batch"))
        })?;
        if slot.is_some() {
            return Err(InvariantViolation::double_settlement(index));
        }
        *slot = Some(outcome);
        Ok(())
    }

    /// Drains every slot in index order. Fails on the first empty slot.
    pub(crate) fn take_all(&self) -> Result<Vec<ItemOutcome>, InvariantViolation> {
        let slots = std::mem::take(&mut *self.slots.lock());
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or_else(|| InvariantViolation::unsettled(index)))
            .collect()
    }
}
