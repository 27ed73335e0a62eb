//! Catalog files
//!
//! A catalog holds plain definitions for objects, actions, rules,
//! resources and projects, read from YAML or JSON. Every top-level key is
//! optional, so definitions may be split across files and merged.
//!
//! ```yaml
//! rules:
//!   - id: strict_review
//!     name: Strict review for level A
//!     priority: 10
//!     condition:
//!       object_type: requirement
//!       attribute: security_level
//!       value: A
//!     actions:
//!       - action: enable_review
//!         target: $source
//! ```
//!
//! [`Catalog::apply`] converts and validates everything before touching the
//! engine, so a bad definition leaves registered state untouched.

use crate::action::{Action, BuiltinEffect, ConfiguredEffect, ParamType, ANY_TYPE};
use crate::engine::{Engine, CONFIG_FILE};
use crate::error::{CatalogError, EngineError, SchedulerError};
use crate::object::{Link, OntologyObject};
use crate::rule::{AttributeCondition, DecisionRule, RuleEffect};
use crate::scheduler::Project;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDefinition {
    pub relation: String,
    pub target: String,
    #[serde(default)]
    pub properties: BTreeMap<String, AttributeValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default, alias = "permitted_actions")]
    pub available_actions: Vec<String>,
    #[serde(default)]
    pub links: Vec<LinkDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "any_type")]
    pub target_object_type: String,
    /// Parameter name to type name (`string`, `number`, `boolean`, `any`)
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Built-in effect kind; defaults to the built-in of the same name
    #[serde(default)]
    pub effect: Option<String>,
    /// Literal attributes written by a configured effect
    #[serde(default)]
    pub set: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub message: Option<String>,
}

fn any_type() -> String {
    ANY_TYPE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub condition: Option<AttributeCondition>,
    #[serde(default)]
    pub actions: Vec<RuleEffect>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

/// Definitions loaded from one or more catalog files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub ontology_objects: Vec<ObjectDefinition>,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub resources: Vec<ResourceDefinition>,
    #[serde(default)]
    pub projects: Vec<ProjectDefinition>,
}

/// Counts of what [`Catalog::apply`] registered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub objects: usize,
    pub actions: usize,
    pub rules: usize,
    pub resources: usize,
    pub projects: usize,
}

impl fmt::Display for CatalogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} objects, {} actions, {} rules, {} resources, {} projects",
            self.objects, self.actions, self.rules, self.resources, self.projects
        )
    }
}

impl Catalog {
    /// Parse a file, choosing the format by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let contents = match extension.as_deref() {
            Some("yml" | "yaml" | "json") => std::fs::read_to_string(path)?,
            _ => return Err(CatalogError::UnsupportedFormat(path.display().to_string())),
        };
        debug!(path = %path.display(), "catalog file read");
        if extension.as_deref() == Some("json") {
            Self::from_json_str(&contents)
        } else {
            Self::from_yaml_str(&contents)
        }
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, CatalogError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Merge every catalog file in a directory, in file-name order
    ///
    /// The engine configuration file is skipped, as is anything that is not
    /// YAML or JSON.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self, CatalogError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some(CONFIG_FILE))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yml" | "yaml" | "json")
                )
            })
            .collect();
        paths.sort();

        let mut catalog = Self::default();
        for path in paths {
            catalog.merge(Self::from_file(&path)?);
        }
        Ok(catalog)
    }

    pub fn merge(&mut self, other: Catalog) {
        self.ontology_objects.extend(other.ontology_objects);
        self.actions.extend(other.actions);
        self.rules.extend(other.rules);
        self.resources.extend(other.resources);
        self.projects.extend(other.projects);
    }

    pub fn is_empty(&self) -> bool {
        self.ontology_objects.is_empty()
            && self.actions.is_empty()
            && self.rules.is_empty()
            && self.resources.is_empty()
            && self.projects.is_empty()
    }

    /// Validate every definition, then register them all
    pub fn apply(&self, engine: &Engine) -> Result<CatalogSummary, CatalogError> {
        let objects: Vec<OntologyObject> = self
            .ontology_objects
            .iter()
            .map(ObjectDefinition::to_object)
            .collect::<Result<_, _>>()?;
        let actions: Vec<Action> = self
            .actions
            .iter()
            .map(ActionDefinition::to_action)
            .collect::<Result<_, _>>()?;
        let rules: Vec<DecisionRule> = self
            .rules
            .iter()
            .map(RuleDefinition::to_rule)
            .collect::<Result<_, _>>()?;
        self.check_scheduler_ids(engine)?;

        let summary = CatalogSummary {
            objects: objects.len(),
            actions: actions.len(),
            rules: rules.len(),
            resources: self.resources.len(),
            projects: self.projects.len(),
        };

        for action in actions {
            engine.register_action(action)?;
        }
        for object in objects {
            engine.register_object(object);
        }
        for resource in &self.resources {
            let name = resource.name.clone().unwrap_or_else(|| resource.id.clone());
            engine.add_resource(resource.id.as_str(), name)?;
        }
        for project in &self.projects {
            let mut p = Project::new(project.id.as_str(), project.priority);
            if let Some(name) = &project.name {
                p = p.with_name(name.as_str());
            }
            engine.register_project(p)?;
        }
        for rule in rules {
            engine.register_rule(rule)?;
        }

        info!(%summary, "catalog applied");
        Ok(summary)
    }

    fn check_scheduler_ids(&self, engine: &Engine) -> Result<(), SchedulerError> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if !seen.insert(resource.id.as_str()) || engine.resource(&resource.id).is_some() {
                return Err(SchedulerError::DuplicateResource(resource.id.clone()));
            }
        }
        let mut seen = HashSet::new();
        for project in &self.projects {
            if !seen.insert(project.id.as_str()) || engine.project(&project.id).is_some() {
                return Err(SchedulerError::DuplicateProject(project.id.clone()));
            }
        }
        Ok(())
    }
}

impl ObjectDefinition {
    pub fn to_object(&self) -> Result<OntologyObject, EngineError> {
        if self.id.trim().is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "object id must not be empty".to_string(),
            ));
        }
        let mut object = OntologyObject::new(self.id.as_str(), self.object_type.as_str());
        if let Some(name) = &self.name {
            object = object.with_name(name.as_str());
        }
        object.attributes = self.attributes.clone();
        object.permitted_actions = self.available_actions.iter().cloned().collect::<BTreeSet<_>>();
        for link in &self.links {
            let mut l = Link::new(link.relation.as_str(), self.id.as_str(), link.target.as_str());
            l.properties = link.properties.clone();
            object.add_link(l);
        }
        Ok(object)
    }
}

impl ActionDefinition {
    pub fn to_action(&self) -> Result<Action, EngineError> {
        let kind = self.effect.as_deref().unwrap_or(&self.name);
        let mut action = match kind.parse::<BuiltinEffect>() {
            Ok(builtin) => Action::new(self.name.as_str(), builtin),
            Err(()) if self.effect.is_none() || kind == "configured" => Action::new(
                self.name.as_str(),
                ConfiguredEffect {
                    set: self.set.clone(),
                    message: self.message.clone(),
                },
            ),
            Err(()) => {
                return Err(EngineError::InvalidConfiguration(format!(
                    "action {} names unknown effect {}",
                    self.name, kind
                )))
            }
        };

        action = action
            .with_description(self.description.as_str())
            .for_type(self.target_object_type.as_str());
        for (name, type_name) in &self.parameters {
            action = action.with_parameter(name.as_str(), type_name.parse::<ParamType>()?);
        }
        action.validate()?;
        Ok(action)
    }
}

impl RuleDefinition {
    pub fn to_rule(&self) -> Result<DecisionRule, EngineError> {
        let name = self.name.clone().unwrap_or_else(|| self.id.clone());
        let mut rule = DecisionRule::new(self.id.as_str(), name)
            .with_description(self.description.as_str())
            .with_priority(self.priority)
            .enabled(self.enabled);
        if let Some(condition) = &self.condition {
            rule = rule.with_condition(condition.clone());
        }
        for effect in &self.actions {
            rule = rule.then(effect.clone());
        }
        rule.validate()?;
        Ok(rule)
    }
}
