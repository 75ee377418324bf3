pub mod logistics;
pub mod pipeline;
