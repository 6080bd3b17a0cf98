//! Configuration access port.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Non-negative integer setting; `None` when the stored value is negative.
    fn get_count(&self, section: &str, key: &str, default: usize) -> Option<usize> {
        usize::try_from(self.get_int(section, key, default as i64)).ok()
    }
}
