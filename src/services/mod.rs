pub mod booking_flow;
pub mod bookings;
pub mod catalog;
pub mod context;
pub mod dialogue;
pub mod intent;
pub mod knowledge;
pub mod responses;
pub mod text;
pub mod validation;
