use serde::{Deserialize, Serialize};

use planledger_core::{Described, FieldSpec, Money, StoreError, StoreResult};

/// Inventory item identifier (e.g. `SG001`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A stocked product.
///
/// `quantity_in_stock` is never negative: every change goes through
/// [`InventoryItem::adjust`], which rejects adjustments that would underflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub item_id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub quantity_in_stock: i64,
    pub price: Money,
}

impl InventoryItem {
    pub fn new(
        item_id: impl Into<ItemId>,
        name: impl Into<String>,
        description: impl Into<String>,
        quantity_in_stock: i64,
        price: Money,
    ) -> StoreResult<Self> {
        let item = Self {
            item_id: item_id.into(),
            name: name.into(),
            description: description.into(),
            quantity_in_stock,
            price,
        };
        item.validate()?;
        Ok(item)
    }

    /// Check the record-level invariants (used at seed and load time).
    pub fn validate(&self) -> StoreResult<()> {
        if self.item_id.as_str().trim().is_empty() {
            return Err(StoreError::validation("item_id cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(StoreError::validation(format!(
                "{}: name cannot be empty",
                self.item_id
            )));
        }
        if self.quantity_in_stock < 0 {
            return Err(StoreError::validation(format!(
                "{}: quantity_in_stock cannot be negative",
                self.item_id
            )));
        }
        if self.price.is_negative() {
            return Err(StoreError::validation(format!(
                "{}: price cannot be negative",
                self.item_id
            )));
        }
        Ok(())
    }

    /// Apply a signed stock delta and return the new quantity.
    pub fn adjust(&mut self, delta: i64) -> StoreResult<i64> {
        let invalid = || StoreError::InvalidAdjustment {
            item_id: self.item_id.to_string(),
            available: self.quantity_in_stock,
            delta,
        };

        let new_stock = self.quantity_in_stock.checked_add(delta).ok_or_else(invalid)?;
        if new_stock < 0 {
            return Err(invalid());
        }
        self.quantity_in_stock = new_stock;
        Ok(new_stock)
    }

    /// Case-insensitive whole-word search over name and description.
    ///
    /// "round" matches "Classic round profile" but not "wraparound".
    pub fn mentions(&self, word: &str) -> bool {
        contains_word(&self.name, word) || contains_word(&self.description, word)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Described for InventoryItem {
    const COLLECTION: &'static str = "inventory";

    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[
            FieldSpec::new("item_id", "string", "unique product key, e.g. SG001"),
            FieldSpec::new("name", "string", "product style, e.g. Aviator"),
            FieldSpec::new("description", "string", "free-text product description"),
            FieldSpec::new("quantity_in_stock", "integer", "units on hand, never negative"),
            FieldSpec::new("price", "decimal", "unit price in USD"),
        ];
        FIELDS
    }
}

/// Whole-word, case-insensitive containment. Multi-word needles match a run of
/// consecutive words.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    let needle: Vec<String> = words(needle).collect();
    if needle.is_empty() {
        return false;
    }
    let hay: Vec<String> = words(haystack).collect();
    hay.windows(needle.len()).any(|w| w == needle.as_slice())
}

fn words(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}
