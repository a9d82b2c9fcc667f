pub mod fetch;
pub mod table;
