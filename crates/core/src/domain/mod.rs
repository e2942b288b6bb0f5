pub mod outcome;
pub mod phone_number;
