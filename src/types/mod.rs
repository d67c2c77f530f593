pub mod events;
pub mod records;
pub mod transaction;
