pub mod logging;
pub mod media;
#[cfg(test)]
pub mod test_utils;
