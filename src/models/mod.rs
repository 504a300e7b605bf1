pub mod allocation;
pub mod event;
pub mod guest;
pub mod order;
pub mod staff;
pub mod ticket;
pub mod tier;

pub use allocation::StaffAllocation;
pub use event::Event;
pub use guest::GuestContact;
pub use order::{Order, OrderStatus};
pub use staff::{CommissionType, StaffIdentity, StaffRole, StaffSale};
pub use ticket::{Ticket, TicketStatus};
pub use tier::TicketTier;
