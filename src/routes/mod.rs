pub mod health;
pub mod menu;
pub mod pages;
pub mod session;
