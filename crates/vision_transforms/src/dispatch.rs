//! Two-key kernel registry: `(operation, Kind) -> Kernel`.
//!
//! Registration happens on a mutable [`DispatcherBuilder`]; `build()` freezes
//! it into a [`Dispatcher`] that is shared read-only between threads.
//!
//! ```text
//! dispatch("horizontal_flip", Image)
//!   ├─ exact kernel for (op, Image)?            → call it
//!   ├─ fallback Image → Tensor registered?      → unwrap, call, wrap_like
//!   └─ otherwise                                → UnsupportedKind
//! ```

use crate::datapoints::{Kind, Overrides, Payload, Value};
use crate::error::{VisionError, VisionResult};
use crate::params::Params;
use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Type-erased kernel.
pub type Kernel = Arc<dyn Fn(Value, &Params) -> Result<Value> + Send + Sync>;

static BUILTIN: Lazy<Dispatcher> = Lazy::new(|| match Dispatcher::builder().with_builtin_kernels() {
    Ok(builder) => builder.build(),
    // An empty builder has nothing to clash with.
    Err(err) => unreachable!("built-in kernel table is inconsistent: {err}"),
});

/// The process-wide table holding every built-in kernel.
pub fn registry() -> &'static Dispatcher {
    &BUILTIN
}

/// Wraps a typed kernel so it can live in the registry.
fn erase<I, O, F>(kernel: F) -> Kernel
where
    I: Payload,
    O: Into<Value>,
    F: Fn(I, &Params) -> Result<O> + Send + Sync + 'static,
{
    Arc::new(move |value: Value, params: &Params| {
        let found = value.kind_name();
        let input = I::from_value(value)
            .ok_or_else(|| anyhow!("kernel for {} received a {} value", I::KIND, found))?;
        Ok(kernel(input, params)?.into())
    })
}

// ============================================================================
// DispatcherBuilder
// ============================================================================

#[derive(Default)]
pub struct DispatcherBuilder {
    table: HashMap<String, HashMap<Kind, Kernel>>,
}

impl DispatcherBuilder {
    /// Registers a typed kernel; the kind is taken from the input type.
    ///
    /// # Example
    /// ```ignore
    /// let mut builder = Dispatcher::builder();
    /// builder.register("invert", |mask: Mask, _: &Params| { ... })?;
    /// ```
    pub fn register<I, O, F>(&mut self, op: &str, kernel: F) -> VisionResult<&mut Self>
    where
        I: Payload,
        O: Into<Value>,
        F: Fn(I, &Params) -> Result<O> + Send + Sync + 'static,
    {
        self.register_raw(op, I::KIND, erase(kernel))
    }

    /// Like [`register`](Self::register) but replaces an existing kernel.
    pub fn register_override<I, O, F>(&mut self, op: &str, kernel: F) -> &mut Self
    where
        I: Payload,
        O: Into<Value>,
        F: Fn(I, &Params) -> Result<O> + Send + Sync + 'static,
    {
        self.register_raw_override(op, I::KIND, erase(kernel))
    }

    pub fn register_raw(&mut self, op: &str, kind: Kind, kernel: Kernel) -> VisionResult<&mut Self> {
        if self.contains(op, kind) {
            return Err(VisionError::Conflict {
                op: op.to_string(),
                kind,
            });
        }
        Ok(self.register_raw_override(op, kind, kernel))
    }

    pub fn register_raw_override(&mut self, op: &str, kind: Kind, kernel: Kernel) -> &mut Self {
        if self
            .table
            .entry(op.to_string())
            .or_default()
            .insert(kind, kernel)
            .is_some()
        {
            debug!(op, %kind, "replaced registered kernel");
        }
        self
    }

    pub fn contains(&self, op: &str, kind: Kind) -> bool {
        self.table
            .get(op)
            .is_some_and(|kernels| kernels.contains_key(&kind))
    }

    /// Adds every built-in kernel.
    ///
    /// A kernel registered earlier for a built-in `(op, kind)` slot is a
    /// [`VisionError::Conflict`]; to replace a built-in, add the built-ins
    /// first and then use [`register_override`](Self::register_override).
    pub fn with_builtin_kernels(mut self) -> VisionResult<Self> {
        crate::kernels::register_builtin(&mut self)?;
        Ok(self)
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher { table: self.table }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Frozen kernel table.
pub struct Dispatcher {
    table: HashMap<String, HashMap<Kind, Kernel>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ops: Vec<_> = self.table.keys().collect();
        ops.sort();
        f.debug_struct("Dispatcher").field("operations", &ops).finish()
    }
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Resolves the kernel for `(op, kind_of(value))` and calls it.
    pub fn dispatch(&self, op: &str, value: Value, params: &Params) -> Result<Value> {
        let Some(kind) = value.kind() else {
            return Err(VisionError::UnsupportedKind {
                op: op.to_string(),
                kind: value.kind_name().to_string(),
            }
            .into());
        };
        let kernels = self.table.get(op);

        if let Some(kernel) = kernels.and_then(|k| k.get(&kind)) {
            trace!(op, %kind, "dispatch");
            return kernel(value, params)
                .with_context(|| format!("operation `{op}` failed on kind {kind}"));
        }

        for &fallback in kind.fallbacks() {
            if let Some(kernel) = kernels.and_then(|k| k.get(&fallback)) {
                debug!(op, %kind, %fallback, "dispatch via fallback");
                return Self::call_unwrapped(kernel, op, value, params)
                    .with_context(|| format!("operation `{op}` failed on kind {kind}"));
            }
        }

        Err(VisionError::UnsupportedKind {
            op: op.to_string(),
            kind: kind.to_string(),
        }
        .into())
    }

    /// Runs a plain-array kernel on a datapoint's payload and re-wraps the result.
    fn call_unwrapped(kernel: &Kernel, op: &str, value: Value, params: &Params) -> Result<Value> {
        let Value::Datapoint(reference) = value else {
            return Err(anyhow!("fallback dispatch of `{op}` needs a datapoint"));
        };
        let output = kernel(Value::Tensor(reference.data().clone()), params)?;
        match output {
            Value::Tensor(data) => Ok(reference.wrap_like(data, &Overrides::none())?.into()),
            other => Err(anyhow!(
                "plain kernel for `{op}` returned {} instead of a tensor",
                other.kind_name()
            )),
        }
    }

    /// Whether `dispatch(op, value)` would find a kernel for `kind`.
    pub fn supports(&self, op: &str, kind: Kind) -> bool {
        let Some(kernels) = self.table.get(op) else {
            return false;
        };
        kernels.contains_key(&kind) || kind.fallbacks().iter().any(|k| kernels.contains_key(k))
    }

    /// Kinds with an exact kernel for `op`.
    pub fn kinds(&self, op: &str) -> Vec<Kind> {
        let mut kinds: Vec<Kind> = self
            .table
            .get(op)
            .map(|k| k.keys().copied().collect())
            .unwrap_or_default();
        kinds.sort();
        kinds
    }

    pub fn operations(&self) -> Vec<&str> {
        let mut ops: Vec<&str> = self.table.keys().map(String::as_str).collect();
        ops.sort_unstable();
        ops
    }
}
