pub mod errors;
pub mod health;
pub mod jobs;
pub mod processes;
pub mod tasks;
