use std::sync::Arc;

/// Completion callback, invoked with the task's original arguments
pub type Callback<A, K> = Arc<dyn Fn(&A, &K) + Send + Sync>;

/// Several callbacks invoked one after another, in registration order
pub struct CompositeCallback<A, K> {
    callbacks: Vec<Callback<A, K>>,
}

impl<A, K> CompositeCallback<A, K> {
    pub fn new(callbacks: Vec<Callback<A, K>>) -> Self {
        Self { callbacks }
    }

    pub fn call(&self, args: &A, kwargs: &K) {
        for callback in &self.callbacks {
            callback(args, kwargs);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<A, K> Default for CompositeCallback<A, K> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_callbacks_run_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = seen.clone();
        let second = seen.clone();

        let composite: CompositeCallback<u32, ()> = CompositeCallback::new(vec![
            Arc::new(move |x: &u32, _: &()| first.lock().unwrap().push(format!("a{x}"))),
            Arc::new(move |x: &u32, _: &()| second.lock().unwrap().push(format!("b{x}"))),
        ]);
        composite.call(&1, &());
        composite.call(&2, &());

        assert_eq!(composite.len(), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn test_empty_composite_is_noop() {
        let composite: CompositeCallback<(), ()> = CompositeCallback::default();
        assert!(composite.is_empty());
        composite.call(&(), &());
    }
}
