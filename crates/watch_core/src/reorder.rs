/// Where a dragged card lands relative to the card under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPosition {
    Before,
    After,
}

/// Resolves the drop position from the pointer's vertical coordinate and the
/// hovered card's bounds: strictly above the midpoint inserts before it.
pub fn drop_position(pointer_y: f64, card_top: f64, card_height: f64) -> DropPosition {
    let midpoint = card_top + card_height / 2.0;
    if pointer_y < midpoint {
        DropPosition::Before
    } else {
        DropPosition::After
    }
}

/// Display order of result cards. Purely in-memory; nothing is persisted and
/// a re-render from server data starts over.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardOrder<T> {
    cards: Vec<T>,
}

impl<T: PartialEq> CardOrder<T> {
    pub fn new(cards: Vec<T>) -> Self {
        Self { cards }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.cards
    }

    pub fn into_inner(self) -> Vec<T> {
        self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Moves `dragged` next to `target`. Returns `false` (and leaves the order
    /// untouched) when either card is unknown or both are the same card.
    pub fn move_card(&mut self, dragged: &T, target: &T, position: DropPosition) -> bool {
        if dragged == target {
            return false;
        }
        let Some(from) = self.cards.iter().position(|card| card == dragged) else {
            return false;
        };
        if !self.cards.iter().any(|card| card == target) {
            return false;
        }

        let card = self.cards.remove(from);
        // Target index is looked up after removal so it is never stale.
        let Some(target_index) = self.cards.iter().position(|c| c == target) else {
            self.cards.insert(from, card);
            return false;
        };
        let insert_at = match position {
            DropPosition::Before => target_index,
            DropPosition::After => target_index + 1,
        };
        self.cards.insert(insert_at, card);
        true
    }
}
