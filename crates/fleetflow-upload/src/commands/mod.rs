pub mod check;
pub mod down;
pub mod plan;
pub mod up;
