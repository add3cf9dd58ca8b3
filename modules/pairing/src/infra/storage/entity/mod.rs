pub mod couple_events;
pub mod couple_photos;
pub mod couples;
pub mod match_requests;
pub mod purge_journal;
pub mod users;
