//! In-memory registry of named, parameterized prompt templates.

use std::collections::{BTreeSet, HashMap};
use std::sync::{OnceLock, RwLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::default_templates;
use super::TemplateError;

/// Broad grouping used to list templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    Agent,
    Task,
    Communication,
    Analysis,
}

/// A registered prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: TemplateCategory,
    /// Template text containing `{variable}` placeholders.
    pub template: String,
    /// Every variable the template requires.
    pub variables: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Authoring input for a new template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: TemplateCategory,
    pub template: String,
    pub variables: Vec<String>,
}

/// Partial update applied by [`TemplateRegistry::update`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<TemplateCategory>,
    pub template: Option<String>,
    pub variables: Option<Vec<String>>,
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^}]+)\}").expect("valid placeholder regex"))
}

/// Statically check that the placeholders in `text` match `declared` exactly.
///
/// Independent of rendering; intended for authoring tools.
#[must_use]
pub fn validate(text: &str, declared: &[String]) -> ValidationReport {
    let found: BTreeSet<&str> = placeholder_pattern()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();

    let mut errors = Vec::new();
    if found.is_empty() {
        if !declared.is_empty() {
            errors.push(
                "Template contains no variable placeholders but variables are defined".to_string(),
            );
        }
    } else {
        for name in &found {
            if !declared.iter().any(|d| d == name) {
                errors.push(format!("Undefined variable: {name}"));
            }
        }
        for name in declared {
            if !found.contains(name.as_str()) {
                errors.push(format!("Variable not used in template: {name}"));
            }
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Derive a template id from its display name.
///
/// `"Weekly Report!"` becomes `"weekly-report"`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Thread-safe store of prompt templates keyed by id.
#[derive(Debug)]
pub struct TemplateRegistry {
    templates: RwLock<HashMap<String, PromptTemplate>>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRegistry {
    /// Create a registry seeded with the built-in templates.
    #[must_use]
    pub fn new() -> Self {
        let registry = Self::empty();
        for (id, template) in default_templates() {
            registry.insert(id, template);
        }
        registry
    }

    /// Create a registry with no templates.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    /// Register a template under an explicit id, replacing any existing one.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn insert(&self, id: impl Into<String>, template: NewTemplate) -> PromptTemplate {
        let id = id.into();
        let now = Utc::now();
        let template = PromptTemplate {
            id: id.clone(),
            name: template.name,
            description: template.description,
            category: template.category,
            template: template.template,
            variables: template.variables,
            created_at: now,
            updated_at: now,
        };
        tracing::info!(id = %template.id, name = %template.name, "Prompt template added");
        self.templates
            .write()
            .expect("RwLock poisoned")
            .insert(id, template.clone());
        template
    }

    /// Register a template with an id derived from its name.
    pub fn add(&self, template: NewTemplate) -> PromptTemplate {
        let id = slugify(&template.name);
        self.insert(id, template)
    }

    /// Apply a partial update. Returns `None` if the id is unknown.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn update(&self, id: &str, update: TemplateUpdate) -> Option<PromptTemplate> {
        let mut templates = self.templates.write().expect("RwLock poisoned");
        let template = templates.get_mut(id)?;

        if let Some(name) = update.name {
            template.name = name;
        }
        if let Some(description) = update.description {
            template.description = description;
        }
        if let Some(category) = update.category {
            template.category = category;
        }
        if let Some(text) = update.template {
            template.template = text;
        }
        if let Some(variables) = update.variables {
            template.variables = variables;
        }
        template.updated_at = Utc::now();

        tracing::info!(id, "Prompt template updated");
        Some(template.clone())
    }

    /// Remove a template. Returns whether it existed.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn delete(&self, id: &str) -> bool {
        let deleted = self
            .templates
            .write()
            .expect("RwLock poisoned")
            .remove(id)
            .is_some();
        if deleted {
            tracing::info!(id, "Prompt template deleted");
        }
        deleted
    }

    /// Look up a template by id.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<PromptTemplate> {
        self.templates
            .read()
            .expect("RwLock poisoned")
            .get(id)
            .cloned()
    }

    /// All templates, sorted by id.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn list_all(&self) -> Vec<PromptTemplate> {
        let mut all: Vec<PromptTemplate> = self
            .templates
            .read()
            .expect("RwLock poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Templates in one category, sorted by id.
    #[must_use]
    pub fn list_by_category(&self, category: TemplateCategory) -> Vec<PromptTemplate> {
        self.list_all()
            .into_iter()
            .filter(|t| t.category == category)
            .collect()
    }

    /// Render a template with the given bindings.
    ///
    /// Every declared variable must be bound to a non-empty value. Placeholders
    /// that are not declared are left in the output untouched.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::NotFound` for an unknown id and
    /// `TemplateError::MissingVariables` naming every unbound variable.
    pub fn render(
        &self,
        id: &str,
        bindings: &HashMap<String, String>,
    ) -> Result<String, TemplateError> {
        let template = self
            .get(id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))?;

        let missing: Vec<String> = template
            .variables
            .iter()
            .filter(|name| bindings.get(*name).map_or(true, String::is_empty))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(TemplateError::MissingVariables(missing));
        }

        let mut rendered = template.template;
        for name in &template.variables {
            let value = bindings.get(name).map_or("", String::as_str);
            rendered = rendered.replace(&format!("{{{name}}}"), value);
        }
        Ok(rendered)
    }
}
