pub mod timezone;
pub mod test_utils;
