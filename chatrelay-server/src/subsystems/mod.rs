pub mod conversation;
pub mod runner;
pub mod summarize;
pub mod sweeper;
pub mod tracker;
