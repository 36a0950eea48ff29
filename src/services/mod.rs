pub mod cache;
pub mod detector;
pub mod engine;
pub mod gateway;
pub mod imaging;
pub mod queue;
pub mod results;
pub mod worker;
