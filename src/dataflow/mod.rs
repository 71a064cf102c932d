pub mod domain;
pub mod framework;
pub mod avail_expr;
pub mod liveness;
