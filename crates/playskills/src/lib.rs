//! Standard skill library
//!
//! Collection of built-in skills for common operations

mod debug;
mod http;
mod math;
mod time;
mod transform;

pub use debug::DebugLogSkill;
pub use http::HttpRequestSkill;
pub use math::AddNumbersSkill;
pub use time::DelaySkill;
pub use transform::{JsonParseSkill, JsonStringifySkill};

use playcore::RegistryError;
use playruntime::SkillRegistry;
use std::sync::Arc;

/// Register all standard skills with a registry
pub fn register_all(registry: &mut SkillRegistry) -> Result<(), RegistryError> {
    registry.register(Arc::new(DebugLogSkill))?;
    registry.register(Arc::new(HttpRequestSkill::new()))?;
    registry.register(Arc::new(AddNumbersSkill))?;
    registry.register(Arc::new(DelaySkill))?;
    registry.register(Arc::new(JsonParseSkill))?;
    registry.register(Arc::new(JsonStringifySkill))?;
    Ok(())
}
