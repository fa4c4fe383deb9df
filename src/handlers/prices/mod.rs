pub mod daily_average;
pub mod error;
pub mod exchanges;
pub mod price;
