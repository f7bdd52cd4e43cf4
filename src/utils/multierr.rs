use std::error::Error;
use std::fmt;

/// Errors collected from sibling tasks, kept in the order they were observed.
///
/// Displays as the first error and continues that error's source chain; the
/// rest are kept for diagnostics.
#[derive(Debug)]
pub struct MultiError<E> {
    errors: Vec<E>,
}

impl<E> MultiError<E> {
    #[cfg(test)]
    pub fn new(errors: Vec<E>) -> Self {
        Self { errors }
    }

    pub fn push(&mut self, error: E) {
        self.errors.push(error);
    }

    pub fn first(&self) -> Option<&E> {
        self.errors.first()
    }

    #[cfg(test)]
    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl<E> Default for MultiError<E> {
    fn default() -> Self {
        Self { errors: Vec::new() }
    }
}

impl<E: fmt::Display> fmt::Display for MultiError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "no errors"),
            [only] => write!(f, "{}", only),
            [first, rest @ ..] => write!(f, "{} (and {} more)", first, rest.len()),
        }
    }
}

impl<E: Error + 'static> Error for MultiError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.errors.first().and_then(|e| e.source())
    }
}
