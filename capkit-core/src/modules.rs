//! The nine workspace module payloads and their static defaults.
//!
//! The sync layer treats every payload as opaque JSON; the types here only
//! fix what each module's static default looks like and how a remote
//! document is merged into it ([`ModuleData::MERGE`]).

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Document, MergeStrategy};
use crate::types::ModuleName;

/// A payload type bound to exactly one workspace module.
pub trait ModuleData:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    const MODULE: ModuleName;
    const MERGE: MergeStrategy = MergeStrategy::Replace;

    /// Static initial value; local state resets to this on sign-out.
    fn initial() -> Self;
}

// ---------------------------------------------------------------------------
// canvas
// ---------------------------------------------------------------------------

/// Lean canvas sections, in display order.
pub const CANVAS_SECTIONS: [&str; 9] = [
    "Problem",
    "Solution",
    "Key Metrics",
    "Unique Value Proposition",
    "Unfair Advantage",
    "Channels",
    "Customer Segments",
    "Cost Structure",
    "Revenue Streams",
];

/// Canvas section name → free text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Canvas(pub BTreeMap<String, String>);

impl Canvas {
    pub fn section(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn set_section(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.0.insert(name.into(), text.into());
    }
}

impl ModuleData for Canvas {
    const MODULE: ModuleName = ModuleName::Canvas;

    fn initial() -> Self {
        Self(
            CANVAS_SECTIONS
                .iter()
                .map(|s| ((*s).to_owned(), String::new()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// personas
// ---------------------------------------------------------------------------

/// One customer persona. Optional attributes are omitted from the stored
/// document when unset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub pain_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The persona list. Stored as `{"data": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Personas(pub Vec<Persona>);

impl ModuleData for Personas {
    const MODULE: ModuleName = ModuleName::Personas;

    fn initial() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// free-form modules
// ---------------------------------------------------------------------------

macro_rules! free_form_module {
    ($(#[$meta:meta])* $name:ident => $module:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Document);

        impl $name {
            pub fn get(&self, key: &str) -> Option<&Value> {
                self.0.get(key)
            }

            pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
                self.0.insert(key.into(), value.into());
            }
        }

        impl ModuleData for $name {
            const MODULE: ModuleName = $module;

            fn initial() -> Self {
                Self::default()
            }
        }
    };
}

free_form_module!(
    /// Market research notes (competitors, sizing, interviews).
    MarketResearch => ModuleName::MarketResearch
);
free_form_module!(
    /// Drafted marketing copy, keyed by asset.
    Copywriting => ModuleName::Copywriting
);
free_form_module!(
    /// Founder mindset exercises.
    Mindset => ModuleName::Mindset
);
free_form_module!(
    /// Product design worksheet.
    ProductDesign => ModuleName::ProductDesign
);
free_form_module!(
    /// Unit economics and pricing calculator inputs.
    Economics => ModuleName::Economics
);
free_form_module!(
    /// Sales pipeline and calendar entries.
    Sales => ModuleName::Sales
);

// ---------------------------------------------------------------------------
// grow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub done: bool,
}

impl ChecklistItem {
    fn open(id: &str, label: &str) -> Self {
        Self {
            id: id.to_owned(),
            label: label.to_owned(),
            done: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LegalPlan {
    pub business_structure: String,
    pub registered_name: String,
    pub licenses: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InvestmentPlan {
    pub funding_goal: f64,
    pub funding_sources: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManagementPlan {
    pub team: Vec<TeamMember>,
    pub hiring_plan: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Checklists {
    pub legal: Vec<ChecklistItem>,
    pub investment: Vec<ChecklistItem>,
    pub management: Vec<ChecklistItem>,
}

impl Default for Checklists {
    fn default() -> Self {
        Self {
            legal: vec![
                ChecklistItem::open("choose-structure", "Choose a business structure"),
                ChecklistItem::open("register-name", "Register your business name"),
                ChecklistItem::open("tax-id", "Obtain a tax identification number"),
                ChecklistItem::open("licenses", "Apply for required licenses and permits"),
            ],
            investment: vec![
                ChecklistItem::open("funding-need", "Estimate how much funding you need"),
                ChecklistItem::open("pitch-deck", "Prepare a pitch deck"),
                ChecklistItem::open("investor-list", "Build a list of potential investors"),
            ],
            management: vec![
                ChecklistItem::open("org-chart", "Draft an organisation chart"),
                ChecklistItem::open("roles", "Define key roles and responsibilities"),
                ChecklistItem::open("first-hire", "Plan your first hire"),
            ],
        }
    }
}

/// Grow-stage planning. Every substructure is always present locally: a
/// remote document missing one gets it from [`Grow::initial`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grow {
    pub legal: LegalPlan,
    pub investment: InvestmentPlan,
    pub management: ManagementPlan,
    pub checklists: Checklists,
}

impl ModuleData for Grow {
    const MODULE: ModuleName = ModuleName::Grow;
    const MERGE: MergeStrategy = MergeStrategy::FillMissing;

    fn initial() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{sanitize, Shape};
    use serde_json::json;

    #[test]
    fn canvas_initial_has_every_section_empty() {
        let canvas = Canvas::initial();
        assert_eq!(canvas.0.len(), CANVAS_SECTIONS.len());
        assert!(canvas.0.values().all(String::is_empty));
        assert_eq!(canvas.section("Problem"), Some(""));
    }

    #[test]
    fn personas_are_a_wrapped_module() {
        let value = sanitize(&Personas::initial()).expect("sanitize");
        assert_eq!(Shape::of(&value), Shape::Wrapped);
    }

    #[test]
    fn unset_persona_fields_are_not_serialized() {
        let persona = Persona {
            id: "p1".into(),
            name: "Ana".into(),
            ..Persona::default()
        };
        let value = sanitize(&persona).expect("sanitize");
        let object = value.as_object().expect("object");
        assert!(!object.contains_key("age"));
        assert!(!object.contains_key("occupation"));
        assert!(!object.contains_key("notes"));
        assert_eq!(object["painPoints"], json!([]));
    }

    #[test]
    fn grow_uses_fill_missing_merge() {
        assert_eq!(Grow::MERGE, MergeStrategy::FillMissing);
        assert_eq!(Canvas::MERGE, MergeStrategy::Replace);
    }

    #[test]
    fn grow_initial_serializes_every_substructure() {
        let value = sanitize(&Grow::initial()).expect("sanitize");
        for key in ["legal", "investment", "management", "checklists"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["checklists"]["legal"][0]["id"], json!("choose-structure"));
    }

    #[test]
    fn free_form_modules_accept_arbitrary_fields() {
        let mut economics = Economics::initial();
        economics.set("price", 49.0);
        economics.set("currency", "EUR");
        assert_eq!(economics.get("currency"), Some(&json!("EUR")));
        assert_eq!(Economics::MODULE, ModuleName::Economics);
    }
}
