pub mod release;
pub mod runner;

pub use runner::{InstallerRunner, RunReport, SUCCESS_MESSAGE};
