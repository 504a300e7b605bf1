pub mod allocations;
pub mod cash_orders;
pub mod commission;
pub mod notify;
pub mod sweep;
