// Numerical guards: size budgets, magnitude scaling, sanitization

pub mod budget;
pub mod sanitize;
pub mod scaling;

pub use budget::{apply_row_budget, apply_sku_budget, BudgetAction};
pub use sanitize::{clamp_non_negative, downcast_f32, downcast_value, sanitize_non_finite};
pub use scaling::MagnitudeScale;
