pub mod accounts;
pub mod actions;
pub mod categories;
pub mod health;
pub mod labels;
pub mod scan;
