use crate::keys::KeyRef;

pub const MAX_CONTACTS: usize = 10;

pub type ContactId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Binding {
    id: ContactId,
    key: KeyRef,
}

/// Contact-to-key associations in a fixed set of slots.
///
/// A slot holds one contact and the single key it presses, so a contact can
/// never be bound to a white and a black key at once.
#[derive(Clone, Debug, Default)]
pub struct ContactTable {
    slots: [Option<Binding>; MAX_CONTACTS],
}

impl ContactTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_of(&self, id: ContactId) -> Option<KeyRef> {
        self.slot_of(id)
            .and_then(|index| self.slots[index].map(|binding| binding.key))
    }

    /// Binds `id` to `key`, replacing any earlier binding for the same id.
    /// Returns false when every slot is taken by other contacts.
    pub fn bind(&mut self, id: ContactId, key: KeyRef) -> bool {
        let index = match self.slot_of(id) {
            Some(index) => index,
            None => match self.slots.iter().position(Option::is_none) {
                Some(index) => index,
                None => return false,
            },
        };
        self.slots[index] = Some(Binding { id, key });
        true
    }

    pub fn unbind(&mut self, id: ContactId) -> Option<KeyRef> {
        let index = self.slot_of(id)?;
        self.slots[index].take().map(|binding| binding.key)
    }

    pub fn is_held(&self, key: KeyRef) -> bool {
        self.slots.iter().flatten().any(|binding| binding.key == key)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.slots = [None; MAX_CONTACTS];
    }

    fn slot_of(&self, id: ContactId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.is_some_and(|binding| binding.id == id))
    }
}
