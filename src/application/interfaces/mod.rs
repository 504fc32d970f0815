pub mod identity;
pub mod payments;
