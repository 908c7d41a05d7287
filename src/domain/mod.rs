// Domain model for template composition

pub mod template;
