pub mod random;
pub mod signal;
pub mod slug;
