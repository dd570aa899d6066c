pub mod availability;
pub mod booking;
pub mod conversation;
pub mod message;
pub mod offer;
pub mod user;

pub use availability::{AvailabilitySlot, NewAvailabilitySlot};
pub use booking::{Booking, BookingStatus, BookingWithParty, NewBooking, PartySummary};
pub use conversation::Conversation;
pub use message::{Message, MessageType};
pub use offer::{BookingOffer, OfferStatus};
pub use user::{User, UserType};
