mod persistence;
mod price_table;

pub use persistence::{
    find_user_by_customer, load_entitlements, load_subscription, mark_past_due,
    save_customer_id, upsert_subscription, StoredSubscription, SubscriptionState, SubscriptionUpsert,
};
pub use price_table::PriceTable;
