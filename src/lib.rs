pub mod args;
pub mod engine;
pub mod error;
pub mod hashlist;
pub mod io;
pub mod job;
pub mod output;
pub mod progress;
pub mod sink;
pub mod supervisor;

