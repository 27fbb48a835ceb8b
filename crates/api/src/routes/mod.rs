pub mod health;
pub mod operator;
