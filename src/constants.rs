/// Column and store names shared by the loader, transformer and store.
/// Header names are case-sensitive and must match the regional exports exactly.

// Input columns every regional export must carry
pub const ORDER_ID: &str = "OrderId";
pub const ORDER_ITEM_ID: &str = "OrderItemId";
pub const QUANTITY_ORDERED: &str = "QuantityOrdered";
pub const ITEM_PRICE: &str = "ItemPrice";
pub const PROMOTION_DISCOUNT: &str = "PromotionDiscount";

// Columns added by the pipeline
pub const REGION: &str = "region";
pub const TOTAL_SALES: &str = "total_sales";
pub const NET_SALE: &str = "net_sale";

/// Columns the transformer refuses to run without, in reporting order.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    ORDER_ID,
    ORDER_ITEM_ID,
    QUANTITY_ORDERED,
    ITEM_PRICE,
    PROMOTION_DISCOUNT,
];

// Store defaults
pub const SALES_TABLE: &str = "sales_data";
pub const DEFAULT_STORE_PATH: &str = "sales_data.db";
pub const DEFAULT_CONFIG_PATH: &str = "sales_etl.toml";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Environment variable overriding the configured store path.
pub const STORE_PATH_ENV: &str = "SALES_ETL_DB";

/// Default regional exports used when no sources are configured.
pub fn default_sources() -> Vec<(&'static str, &'static str)> {
    vec![
        ("data/order_region_a.csv", "A"),
        ("data/order_region_b.csv", "B"),
    ]
}
