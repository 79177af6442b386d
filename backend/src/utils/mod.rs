pub mod guard;
pub mod hash;
pub mod jwt;
