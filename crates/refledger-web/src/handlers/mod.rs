pub mod enhance;
pub mod extract;
pub mod records;
