pub mod animated;
pub mod manager;
pub mod realtime;
