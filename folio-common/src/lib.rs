pub mod date;
pub mod model;
pub mod read_time;
