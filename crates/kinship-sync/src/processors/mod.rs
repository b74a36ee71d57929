//! Built-in curator processors

mod consistency;
mod gender;
mod related;
mod uid;

pub use consistency::ConsistencyProcessor;
pub use gender::{GenderInferenceProcessor, GenderRenderProcessor};
pub use related::{BlockToListProcessor, ListToBlockProcessor, ReciprocalProcessor};
pub use uid::UidProcessor;

use crate::error::RegistryError;
use crate::pipeline::RegistryBuilder;

/// Register the built-ins in run order
pub fn register_standard(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder
        .register(UidProcessor)?
        .register(ListToBlockProcessor)?
        .register(BlockToListProcessor)?
        .register(GenderInferenceProcessor)?
        .register(GenderRenderProcessor)?
        .register(ReciprocalProcessor)?
        .register(ConsistencyProcessor)?;
    Ok(())
}
