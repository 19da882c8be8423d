pub mod catalog;
pub mod column;
pub mod ids;
pub mod ticket;
pub mod value;
