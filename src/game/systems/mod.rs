pub mod movement;
pub mod capture;
pub mod combat;
pub mod ai;
