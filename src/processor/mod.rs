pub mod customers;
pub mod frame;
pub mod mergers;
pub mod orders;
pub mod products;
pub mod profile;
pub mod quality;
pub mod standardizers;
pub mod validators;

pub use customers::CustomerCleaner;
pub use orders::{OrderCleaner, split_order_tables};
pub use products::{ProductCleaner, suppliers_table};
pub use profile::{ColumnProfile, profile_table};
pub use quality::{CleanedTable, CleaningReport, ColumnQuality};
