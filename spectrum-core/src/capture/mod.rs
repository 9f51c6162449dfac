pub mod device_session;
pub mod engine;
pub mod packet_processor;
pub mod signal;
