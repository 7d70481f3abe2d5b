mod prompt;
mod run;

pub mod storage;

pub use run::run;
