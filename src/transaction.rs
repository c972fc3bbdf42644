//! The transaction union carried by every ledger entry.
use super::error::TransactionError;

/// Who performed an action. Every non-genesis transaction carries one.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Actor {
    #[n(0)]
    pub user_name: String,
    #[n(1)]
    pub admin_user_id: u64,
}

impl Actor {
    pub fn new(user_name: impl Into<String>, admin_user_id: u64) -> Self {
        Self {
            user_name: user_name.into(),
            admin_user_id,
        }
    }
}

/// Partial attribute update applied by an item edit. `None` fields retain
/// their prior values during replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ItemPatch {
    #[n(0)]
    pub product_name: Option<String>,
    #[n(1)]
    pub new_category: Option<String>,
    #[n(2)]
    pub price: Option<u64>,
    #[n(3)]
    pub image_url: Option<String>,
}

/// One recorded state change, discriminated by kind.
///
/// Prices are integer minor units. Administrative actions that never touch
/// inventory all travel through the `Administrative` variant; the replay
/// engine counts them and otherwise leaves them inert, which keeps the fold
/// forward-compatible with kinds it does not need to understand.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum Transaction {
    #[n(0)]
    Genesis,
    #[n(1)]
    CreateItem {
        #[n(0)]
        item_sku: String,
        #[n(1)]
        product_name: String,
        #[n(2)]
        category: String,
        #[n(3)]
        price: u64,
        #[n(4)]
        image_url: Option<String>,
        #[n(5)]
        actor: Actor,
    },
    #[n(2)]
    StockIn {
        #[n(0)]
        item_sku: String,
        #[n(1)]
        quantity: u64,
        #[n(2)]
        location: String,
        #[n(3)]
        actor: Actor,
    },
    #[n(3)]
    StockOut {
        #[n(0)]
        item_sku: String,
        #[n(1)]
        quantity: u64,
        #[n(2)]
        location: String,
        #[n(3)]
        actor: Actor,
    },
    #[n(4)]
    Move {
        #[n(0)]
        item_sku: String,
        #[n(1)]
        quantity: u64,
        #[n(2)]
        from_location: String,
        #[n(3)]
        to_location: String,
        #[n(4)]
        actor: Actor,
    },
    #[n(5)]
    EditItem {
        #[n(0)]
        item_sku: String,
        #[n(1)]
        patch: ItemPatch,
        #[n(2)]
        actor: Actor,
    },
    #[n(6)]
    DeleteItem {
        #[n(0)]
        item_sku: String,
        #[n(1)]
        actor: Actor,
    },
    #[n(7)]
    Administrative {
        #[n(0)]
        action: String,
        #[n(1)]
        detail: String,
        #[n(2)]
        actor: Actor,
    },
}

impl Transaction {
    /// Stable display label for logs and audit views.
    pub fn label(&self) -> &str {
        match self {
            Transaction::Genesis => "GENESIS",
            Transaction::CreateItem { .. } => "CREATE_ITEM",
            Transaction::StockIn { .. } => "STOCK_IN",
            Transaction::StockOut { .. } => "STOCK_OUT",
            Transaction::Move { .. } => "MOVE",
            Transaction::EditItem { .. } => "ADMIN_EDIT_ITEM",
            Transaction::DeleteItem { .. } => "DELETE_ITEM",
            Transaction::Administrative { action, .. } => action,
        }
    }

    pub fn actor(&self) -> Option<&Actor> {
        match self {
            Transaction::Genesis => None,
            Transaction::CreateItem { actor, .. }
            | Transaction::StockIn { actor, .. }
            | Transaction::StockOut { actor, .. }
            | Transaction::Move { actor, .. }
            | Transaction::EditItem { actor, .. }
            | Transaction::DeleteItem { actor, .. }
            | Transaction::Administrative { actor, .. } => Some(actor),
        }
    }

    pub fn item_sku(&self) -> Option<&str> {
        match self {
            Transaction::CreateItem { item_sku, .. }
            | Transaction::StockIn { item_sku, .. }
            | Transaction::StockOut { item_sku, .. }
            | Transaction::Move { item_sku, .. }
            | Transaction::EditItem { item_sku, .. }
            | Transaction::DeleteItem { item_sku, .. } => Some(item_sku),
            Transaction::Genesis | Transaction::Administrative { .. } => None,
        }
    }

    /// Structural field validation for this transaction's kind. Performed
    /// at append time and again by the replay engine.
    pub fn validate(&self) -> Result<(), TransactionError> {
        match self {
            Transaction::Genesis | Transaction::Administrative { .. } => Ok(()),
            Transaction::CreateItem {
                item_sku,
                product_name,
                ..
            } => {
                if item_sku.is_empty() {
                    return Err(TransactionError::EmptySku("CREATE_ITEM"));
                }
                if product_name.is_empty() {
                    return Err(TransactionError::EmptyName("CREATE_ITEM"));
                }
                Ok(())
            }
            Transaction::StockIn {
                item_sku,
                quantity,
                location,
                ..
            } => validate_movement("STOCK_IN", item_sku, *quantity, [location]),
            Transaction::StockOut {
                item_sku,
                quantity,
                location,
                ..
            } => validate_movement("STOCK_OUT", item_sku, *quantity, [location]),
            Transaction::Move {
                item_sku,
                quantity,
                from_location,
                to_location,
                ..
            } => validate_movement("MOVE", item_sku, *quantity, [from_location, to_location]),
            Transaction::EditItem { item_sku, .. } => {
                if item_sku.is_empty() {
                    return Err(TransactionError::EmptySku("ADMIN_EDIT_ITEM"));
                }
                Ok(())
            }
            Transaction::DeleteItem { item_sku, .. } => {
                if item_sku.is_empty() {
                    return Err(TransactionError::EmptySku("DELETE_ITEM"));
                }
                Ok(())
            }
        }
    }
}

fn validate_movement<'a>(
    label: &'static str,
    item_sku: &str,
    quantity: u64,
    locations: impl IntoIterator<Item = &'a String>,
) -> Result<(), TransactionError> {
    if item_sku.is_empty() {
        return Err(TransactionError::EmptySku(label));
    }
    if quantity == 0 {
        return Err(TransactionError::ZeroQuantity(label));
    }
    for location in locations {
        if location.is_empty() {
            return Err(TransactionError::EmptyLocation(label));
        }
    }
    Ok(())
}
