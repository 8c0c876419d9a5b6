pub mod applications;
pub mod certificates;
pub mod common;
pub mod health;
pub mod verify;
