//! Built-in kernels, one module per family.
//!
//! Every kernel is a plain function `fn(Payload, &Params) -> Result<Payload>`
//! and can be called directly; [`register_builtin`] installs them all in a
//! [`DispatcherBuilder`].

pub mod augment;
pub mod conversion;
pub mod geometric;
pub mod meta;
pub mod photometric;
pub mod temporal;
pub(crate) mod util;

use crate::dispatch::DispatcherBuilder;
use crate::error::VisionResult;

/// Fails with `Conflict` if `b` already holds a kernel for a built-in slot.
pub(crate) fn register_builtin(b: &mut DispatcherBuilder) -> VisionResult<()> {
    geometric::register(b)?;
    photometric::register(b)?;
    meta::register(b)?;
    augment::register(b)?;
    temporal::register(b)?;
    conversion::register(b)?;
    Ok(())
}
