use crate::error::{Error, Result};

/// Owning handle with an explicit, one-way release.
///
/// Every access goes through [`Handle::get`], which fails once the value has
/// been released instead of handing out stale data.
#[derive(Debug)]
pub struct Handle<T> {
    inner: Option<T>,
}

impl<T> Handle<T> {
    pub fn new(value: T) -> Self {
        Self { inner: Some(value) }
    }

    pub fn get(&self) -> Result<&T> {
        self.inner.as_ref().ok_or(Error::UseAfterRelease)
    }

    /// Takes the value out of the handle. A second release is an error.
    pub fn release(&mut self) -> Result<T> {
        self.inner.take().ok_or(Error::DoubleRelease)
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }
}
