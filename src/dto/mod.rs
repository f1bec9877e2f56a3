pub mod guild;
pub mod health;
pub mod validation;
