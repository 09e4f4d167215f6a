//! Memoized column values

use std::cell::OnceCell;

use crate::error::Result;

/// A value read from the collection at most once.
///
/// The cell is empty until first access; `clear` puts it back in that state.
#[derive(Debug, Clone)]
pub struct Lazy<T>(OnceCell<T>);

impl<T> Default for Lazy<T> {
    fn default() -> Self {
        Self(OnceCell::new())
    }
}

impl<T: Clone> Lazy<T> {
    /// Cached value, if already loaded or preset.
    pub fn get(&self) -> Option<T> {
        self.0.get().cloned()
    }

    /// Return the cached value or run `load` and cache its result.
    ///
    /// A failed load leaves the cell empty.
    pub fn get_or_load(&self, load: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(value) = self.0.get() {
            return Ok(value.clone());
        }
        let value = load()?;
        let _ = self.0.set(value.clone());
        Ok(value)
    }

    /// Override the cached value.
    pub fn set(&mut self, value: T) {
        self.0 = OnceCell::from(value);
    }

    /// Drop the cached value.
    pub fn clear(&mut self) {
        self.0.take();
    }

    pub fn is_loaded(&self) -> bool {
        self.0.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;

    #[test]
    fn test_loads_once() {
        let lazy = Lazy::<i64>::default();
        let calls = Cell::new(0);

        let load = || {
            calls.set(calls.get() + 1);
            Ok(7)
        };
        assert_eq!(lazy.get_or_load(load).unwrap(), 7);
        assert_eq!(lazy.get_or_load(|| Ok(99)).unwrap(), 7);
        assert_eq!(calls.get(), 1);
        assert!(lazy.is_loaded());
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let lazy = Lazy::<String>::default();
        assert!(lazy.get_or_load(|| Err(Error::other("boom"))).is_err());
        assert!(!lazy.is_loaded());
        assert_eq!(lazy.get_or_load(|| Ok("ok".to_string())).unwrap(), "ok");
    }

    #[test]
    fn test_set_and_clear() {
        let mut lazy = Lazy::<i64>::default();
        lazy.set(3);
        assert_eq!(lazy.get(), Some(3));
        lazy.clear();
        assert_eq!(lazy.get(), None);
        assert_eq!(lazy.get_or_load(|| Ok(4)).unwrap(), 4);
    }
}
