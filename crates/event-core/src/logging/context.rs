use std::collections::BTreeMap;
use std::fmt;
use tracing::Span;

/// Context attached to the spans the bus opens
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Component that is generating the log
    pub component: &'static str,
    /// Operation being performed
    pub operation: &'static str,
    /// Additional contextual fields
    pub fields: BTreeMap<&'static str, String>,
}

impl LogContext {
    /// Create a new log context for a component and operation
    pub fn new(component: &'static str, operation: &'static str) -> Self {
        LogContext {
            component,
            operation,
            fields: BTreeMap::new(),
        }
    }

    /// Add a field to the context
    pub fn with_field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.insert(key, value.to_string());
        self
    }

    /// Create a debug-level span carrying this context.
    ///
    /// Extra fields are rendered into a single `context` field since span
    /// field names must be known statically.
    pub fn span(&self) -> Span {
        if self.fields.is_empty() {
            tracing::debug_span!("tickbus", component = self.component, operation = self.operation)
        } else {
            tracing::debug_span!(
                "tickbus",
                component = self.component,
                operation = self.operation,
                context = %FieldList(&self.fields)
            )
        }
    }

    /// Run `f` inside this context's span
    pub fn in_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.span().in_scope(f)
    }
}

struct FieldList<'a>(&'a BTreeMap<&'static str, String>);

impl fmt::Display for FieldList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.component, self.operation)?;
        for (key, value) in &self.fields {
            write!(f, "[{}={}]", key, value)?;
        }
        Ok(())
    }
}
