use playcore::{RegistryError, Skill};
use std::collections::HashMap;
use std::sync::Arc;

/// Lookup seam between the engine and wherever skills live
pub trait SkillResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Skill>>;

    /// Every resolvable name, used for "did you mean" suggestions
    fn skill_names(&self) -> Vec<String>;
}

/// Summary of a registered skill
#[derive(Debug, Clone, PartialEq)]
pub struct SkillInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub has_schema: bool,
}

/// Registry of available skills, keyed by name
#[derive(Default)]
pub struct SkillRegistry {
    skills: HashMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill under its own name; names must be unique
    pub fn register(&mut self, skill: Arc<dyn Skill>) -> Result<(), RegistryError> {
        let name = skill.name().to_string();
        if self.skills.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }

        tracing::info!("Registering skill: {}", name);
        self.skills.insert(name, skill);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.skills.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Registered names, sorted
    pub fn list_skills(&self) -> Vec<String> {
        let mut names: Vec<String> = self.skills.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn info(&self, name: &str) -> Option<SkillInfo> {
        self.skills.get(name).map(|skill| SkillInfo {
            name: skill.name().to_string(),
            version: skill.version().to_string(),
            description: skill.description().to_string(),
            has_schema: skill.input_schema().is_some(),
        })
    }

    pub fn clear(&mut self) {
        self.skills.clear();
    }
}

impl SkillResolver for SkillRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.get(name)
    }

    fn skill_names(&self) -> Vec<String> {
        self.list_skills()
    }
}
