use std::fmt;

/// Synchronous fan-out for one event category. Callbacks run in registration order on the
/// caller's thread, before the emitting method returns.
pub struct Listeners<T: ?Sized> {
    callbacks: Vec<Box<dyn FnMut(&T) + Send + 'static>>,
}

impl<T: ?Sized> Listeners<T> {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn add(&mut self, callback: impl FnMut(&T) + Send + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn emit(&mut self, value: &T) {
        for callback in self.callbacks.iter_mut() {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<T: ?Sized> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn dispatches_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners: Listeners<str> = Listeners::new();
        assert!(listeners.is_empty());
        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            listeners.add(move |value: &str| seen.lock().unwrap().push(format!("{tag}:{value}")));
        }

        listeners.emit("x");
        assert_eq!(*seen.lock().unwrap(), vec!["a:x", "b:x"]);
        assert_eq!(listeners.len(), 2);
    }
}
