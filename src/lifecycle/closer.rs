use std::fmt;

/// A release handle run once, after both transports have exited.
pub struct Closer {
    name: String,
    close: Box<dyn FnOnce() + Send>,
}

impl Closer {
    pub fn new<F>(name: impl Into<String>, close: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            name: name.into(),
            close: Box::new(close),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn close(self) {
        (self.close)()
    }
}

impl fmt::Debug for Closer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closer").field("name", &self.name).finish()
    }
}
