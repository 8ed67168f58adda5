pub mod daily_log;
pub mod day_off;
