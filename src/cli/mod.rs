pub mod exchange;
pub mod rates;
pub mod ui;
pub mod watch;
