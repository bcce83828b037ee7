pub mod change_log;
pub mod updater;
