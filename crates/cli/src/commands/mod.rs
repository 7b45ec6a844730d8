pub mod calendar;
pub mod chat;
pub mod onboard;
pub mod threads;
