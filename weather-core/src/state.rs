use tokio::sync::watch;

/// Observable single-value cell.
///
/// Holds the latest value and notifies subscribers when it changes. Setting an
/// equal value is not a change.
#[derive(Debug)]
pub struct StateCell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone + PartialEq> StateCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Returns whether subscribers were notified.
    pub fn set(&self, value: T) -> bool {
        self.tx.send_if_modified(|slot| {
            if *slot == value {
                false
            } else {
                *slot = value;
                true
            }
        })
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.tx.borrow());
        self.set(next)
    }

    /// A receiver positioned at the present value; `changed()` resolves on the next set.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + PartialEq + Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
