use std::error::Error as StdError;
use std::fmt;

/// The boxed error every `ContextError` carries as its source.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used by every public operation of a resource client or manager.
pub type ContextResult<T> = Result<T, ContextError>;

/// A dotted naming path such as `Application.Postgresql`.
///
/// Components receive the context of their owner and append their own name,
/// so that a failure deep inside a client surfaces at the top level with the
/// full path of where it originated. The value is immutable; `append` returns
/// a new context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    path: String,
}

impl ErrorContext {
    /// Creates a context rooted at `root`.
    pub fn new(root: impl Into<String>) -> Self {
        Self { path: root.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns a new context with `segment` appended to the path.
    pub fn append(&self, segment: &str) -> Self {
        Self {
            path: self.join(segment),
        }
    }

    /// Returns the wrapper a method named `name` uses for its errors.
    pub fn method(&self, name: &str) -> MethodWrapper {
        MethodWrapper {
            path: self.join(name),
        }
    }

    /// Returns a wrapper for a free function that has no owning component.
    pub fn function(name: &str) -> MethodWrapper {
        MethodWrapper {
            path: name.to_string(),
        }
    }

    fn join(&self, segment: &str) -> String {
        if self.path.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", self.path, segment)
        }
    }
}

/// Prefixes errors with the full path of one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodWrapper {
    path: String,
}

impl MethodWrapper {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wraps `err`, keeping it reachable through `Error::source`.
    pub fn wrap<E: Into<BoxError>>(&self, err: E) -> ContextError {
        ContextError {
            path: self.path.clone(),
            source: err.into(),
        }
    }
}

/// An error annotated with the dotted path of the method that returned it.
///
/// Display renders as `"<path>: <source>"`. Nested wrappers therefore read as
/// the call chain from the outermost operation inwards.
#[derive(Debug)]
pub struct ContextError {
    path: String,
    source: BoxError,
}

impl ContextError {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Walks the source chain and returns the first error of type `E`.
    pub fn find<E: StdError + 'static>(&self) -> Option<&E> {
        let mut current: Option<&(dyn StdError + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(found) = err.downcast_ref::<E>() {
                return Some(found);
            }
            current = err.source();
        }
        None
    }

    /// Whether an error of type `E` appears anywhere in the source chain.
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.find::<E>().is_some()
    }

    /// The innermost error of the chain.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.source)
    }
}

impl StdError for ContextError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.source)
    }
}

/// Extension for wrapping the error side of a `Result` in one call.
///
/// `Ok` values pass through untouched.
pub trait WrapErr<T> {
    fn wrap_err(self, wrapper: &MethodWrapper) -> ContextResult<T>;
}

impl<T, E: Into<BoxError>> WrapErr<T> for Result<T, E> {
    fn wrap_err(self, wrapper: &MethodWrapper) -> ContextResult<T> {
        self.map_err(|err| wrapper.wrap(err))
    }
}
