pub mod assessment;
pub mod badge;
pub mod catalog;
pub mod password_reset;
pub mod progress;
pub mod user;
