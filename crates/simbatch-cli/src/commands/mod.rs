pub mod enumerate;
pub mod run;
