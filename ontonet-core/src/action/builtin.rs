//! Built-in effects
//!
//! The fixed set of effects the engine knows by name, plus the fallback
//! used for actions defined purely in a catalog.

use super::effect::{param_str, param_str_or, Effect, EffectContext};
use crate::error::EffectError;
use crate::value::{AttributeValue, Params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Effects compiled into the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinEffect {
    /// Write `params.value` into `params.attribute`
    SetAttribute,
    EnableReview,
    ReservePlatform,
    Notify,
    PowerOn,
    LoadFirmware,
    CodeReview,
    StaticAnalysis,
    /// Request `params.resource` for `params.project` from the scheduler
    AcquireResource,
    ReleaseResource,
}

impl BuiltinEffect {
    pub const ALL: [BuiltinEffect; 10] = [
        BuiltinEffect::SetAttribute,
        BuiltinEffect::EnableReview,
        BuiltinEffect::ReservePlatform,
        BuiltinEffect::Notify,
        BuiltinEffect::PowerOn,
        BuiltinEffect::LoadFirmware,
        BuiltinEffect::CodeReview,
        BuiltinEffect::StaticAnalysis,
        BuiltinEffect::AcquireResource,
        BuiltinEffect::ReleaseResource,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinEffect::SetAttribute => "set_attribute",
            BuiltinEffect::EnableReview => "enable_review",
            BuiltinEffect::ReservePlatform => "reserve_platform",
            BuiltinEffect::Notify => "notify",
            BuiltinEffect::PowerOn => "power_on",
            BuiltinEffect::LoadFirmware => "load_firmware",
            BuiltinEffect::CodeReview => "code_review",
            BuiltinEffect::StaticAnalysis => "static_analysis",
            BuiltinEffect::AcquireResource => "acquire_resource",
            BuiltinEffect::ReleaseResource => "release_resource",
        }
    }
}

impl FromStr for BuiltinEffect {
    type Err = ();

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        BuiltinEffect::ALL
            .into_iter()
            .find(|b| b.name() == name)
            .ok_or(())
    }
}

impl Effect for BuiltinEffect {
    fn apply(&self, ctx: &mut EffectContext<'_>, params: &Params) -> Result<(), EffectError> {
        match self {
            BuiltinEffect::SetAttribute => {
                let attribute = param_str(params, "attribute")?.to_string();
                let value = params.get("value").cloned().unwrap_or_default();
                ctx.set_attribute(&attribute, value)?;
            }
            BuiltinEffect::EnableReview => {
                ctx.set_attribute("review_required", true)?;
                ctx.set_attribute("review_level", "strict")?;
                ctx.notify("mandatory review enabled");
            }
            BuiltinEffect::ReservePlatform => {
                let platform = param_str_or(params, "platform", "default").to_string();
                ctx.set_attribute("reserved_platform", platform.as_str())?;
                ctx.notify(format!("test platform reserved: {}", platform));
            }
            BuiltinEffect::Notify => {
                ctx.notify(param_str_or(params, "message", "state updated"));
            }
            BuiltinEffect::PowerOn => {
                ctx.set_attribute("power_status", "on")?;
                ctx.notify("device powered on");
            }
            BuiltinEffect::LoadFirmware => {
                let firmware = param_str_or(params, "firmware_version", "latest").to_string();
                ctx.set_attribute("firmware", firmware.as_str())?;
                ctx.notify(format!("firmware loaded: {}", firmware));
            }
            BuiltinEffect::CodeReview => {
                ctx.set_attribute("code_review_status", "in_progress")?;
                ctx.notify("code review started");
            }
            BuiltinEffect::StaticAnalysis => {
                ctx.set_attribute("static_analysis_status", "running")?;
                ctx.notify("static analysis started");
            }
            BuiltinEffect::AcquireResource => {
                let resource = param_str(params, "resource")?;
                let project = param_str(params, "project")?;
                let allocation = ctx.request_resource(resource, project);
                if allocation.is_granted() {
                    ctx.set_attribute("held_resource", resource)?;
                } else {
                    ctx.notify(format!("resource {} not granted: {}", resource, allocation));
                }
            }
            BuiltinEffect::ReleaseResource => {
                let resource = param_str(params, "resource")?;
                ctx.release_resource(resource)?;
            }
        }
        Ok(())
    }

    fn kind(&self) -> &str {
        self.name()
    }
}

/// Effect for catalog-defined actions without a built-in implementation
///
/// Writes a literal attribute mapping onto the target and optionally
/// publishes a message. With neither, it only records that it ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredEffect {
    #[serde(default)]
    pub set: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Effect for ConfiguredEffect {
    fn apply(&self, ctx: &mut EffectContext<'_>, _params: &Params) -> Result<(), EffectError> {
        for (attribute, value) in &self.set {
            ctx.set_attribute(attribute, value.clone())?;
        }
        match &self.message {
            Some(message) => ctx.notify(message.clone()),
            None if self.set.is_empty() => ctx.notify(format!("{} completed", ctx.action())),
            None => {}
        }
        Ok(())
    }

    fn kind(&self) -> &str {
        "configured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_round_trip() {
        for builtin in BuiltinEffect::ALL {
            assert_eq!(builtin.name().parse::<BuiltinEffect>(), Ok(builtin));
        }
        assert!("warp_drive".parse::<BuiltinEffect>().is_err());
    }

    #[test]
    fn test_serde_names_match() {
        let parsed: BuiltinEffect = serde_yaml::from_str("load_firmware").unwrap();
        assert_eq!(parsed, BuiltinEffect::LoadFirmware);
    }
}
