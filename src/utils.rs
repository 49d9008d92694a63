//! Helper functions and data types

use std::sync::Arc;

/// Helper for storing idempotent closures/functions with one argument
#[derive(Clone)]
pub struct WrappedFunc<Input, Output> {
    name: String,
    func: Arc<dyn Fn(Input) -> Output + Send + Sync + 'static>,
}

impl<I, J> WrappedFunc<I, J> {
    pub fn new<N, F>(name: N, func: F) -> Self
    where
        N: Into<String>,
        F: Fn(I) -> J + Send + Sync + 'static,
    {
        Self { name: name.into(), func: Arc::new(func) }
    }

    pub fn call(&self, input: I) -> J {
        self.func.as_ref()(input)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<I, J> std::fmt::Debug for WrappedFunc<I, J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<WrappedFunc: {}>", self.name)
    }
}

// Functions are identified by name only, so that columns built from them can
// be ordered and deduplicated.
impl<I, J> PartialEq for WrappedFunc<I, J> {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq(&other.name)
    }
}

impl<I, J> Eq for WrappedFunc<I, J> {}

impl<I, J> PartialOrd for WrappedFunc<I, J> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<I, J> Ord for WrappedFunc<I, J> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

impl<I, J> std::hash::Hash for WrappedFunc<I, J> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Median of `values`, averaging the two middle elements for even lengths.
/// Returns NaN for an empty input.
pub fn median_of_floats(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    values.sort_by(f64::total_cmp);

    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::{median_of_floats, WrappedFunc};

    #[test]
    fn median() {
        assert_eq!(median_of_floats(vec![3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median_of_floats(vec![4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median_of_floats(vec![]).is_nan());
    }

    #[test]
    fn wrapped_funcs_compare_by_name() {
        let double = WrappedFunc::new("double", |x: f64| 2.0 * x);
        let other = WrappedFunc::new("double", |x: f64| 3.0 * x);

        assert_eq!(double.call(2.0), 4.0);
        assert_eq!(double, other);
        assert_eq!(double.name(), "double");
    }
}
