pub mod points;
pub mod scrap;
pub mod session;
pub mod vote;
