pub mod fft_processor;
pub mod frequency_mapper;
pub mod post_processor;
pub mod ring_buffer;
