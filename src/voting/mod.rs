pub mod announce;
pub mod policy;
pub mod service;
pub mod sweeper;

#[cfg(test)]
pub mod testing;

pub use service::DayOffService;
