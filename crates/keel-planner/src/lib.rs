pub mod plan;
pub mod validate;

pub use plan::{plan_down, plan_up};
pub use validate::{validate_applied, validate_available};
