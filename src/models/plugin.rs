//! Structured plugin records as produced by the external ESP/ESM parser.
//!
//! The parser hands over loosely shaped records (`type` + optional fields).
//! They are converted once, at deserialization time, into [`EspRecord`]
//! variants carrying only the fields the miners read. Records without a form
//! id still deserialize; the miners skip them with a warning so one bad
//! record cannot abort an analysis pass.

use serde::{Deserialize, Serialize};

/// 32-bit form identifier (load-order index in the top byte)
pub type FormId = u32;

/// Render a form id the way xEdit displays it
pub fn format_form_id(form_id: FormId) -> String {
    format!("{:08X}", form_id)
}

/// One parsed plugin file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EspFile {
    pub file_name: String,
    #[serde(default)]
    pub masters: Vec<String>,
    #[serde(default)]
    pub records: Vec<EspRecord>,
}

impl EspFile {
    pub fn new(file_name: impl Into<String>, records: Vec<EspRecord>) -> Self {
        Self {
            file_name: file_name.into(),
            masters: Vec::new(),
            records,
        }
    }

    /// Quest records in file order
    pub fn quests(&self) -> impl Iterator<Item = &QuestRecord> {
        self.records.iter().filter_map(|record| match record {
            EspRecord::Quest(quest) => Some(quest),
            _ => None,
        })
    }
}

/// A record that links to other forms by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkedRecord {
    pub signature: String,
    pub form_id: Option<FormId>,
    /// Parent cell for placed references
    pub cell_id: Option<FormId>,
    pub references: Vec<FormId>,
    pub dependencies: Vec<FormId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestRecord {
    pub form_id: Option<FormId>,
    pub name: String,
    pub objectives: Vec<QuestObjective>,
    pub prerequisites: Vec<QuestPrerequisite>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestObjective {
    pub id: String,
    pub text: String,
    pub rewards: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestPrerequisite {
    pub quest_id: FormId,
    #[serde(default)]
    pub required: bool,
}

/// Typed plugin record, one variant per record family the miners care about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRecord", into = "RawRecord")]
pub enum EspRecord {
    /// `CELL` / `WRLD`
    Cell(LinkedRecord),
    /// `REFR` / `ACHR`
    Reference(LinkedRecord),
    /// `QUST`
    Quest(QuestRecord),
    /// Any other signature (`PERK`, `NPC_`, `WEAP`, ...)
    Other(LinkedRecord),
}

impl EspRecord {
    pub fn signature(&self) -> &str {
        match self {
            EspRecord::Cell(record) | EspRecord::Reference(record) | EspRecord::Other(record) => {
                &record.signature
            }
            EspRecord::Quest(_) => "QUST",
        }
    }

    pub fn form_id(&self) -> Option<FormId> {
        match self {
            EspRecord::Cell(record) | EspRecord::Reference(record) | EspRecord::Other(record) => {
                record.form_id
            }
            EspRecord::Quest(quest) => quest.form_id,
        }
    }

    pub fn references(&self) -> &[FormId] {
        match self {
            EspRecord::Cell(record) | EspRecord::Reference(record) | EspRecord::Other(record) => {
                &record.references
            }
            EspRecord::Quest(_) => &[],
        }
    }

    pub fn dependencies(&self) -> &[FormId] {
        match self {
            EspRecord::Cell(record) | EspRecord::Reference(record) | EspRecord::Other(record) => {
                &record.dependencies
            }
            EspRecord::Quest(_) => &[],
        }
    }

    /// Parent cell of a placed reference
    pub fn parent_cell(&self) -> Option<FormId> {
        match self {
            EspRecord::Reference(record) => record.cell_id,
            _ => None,
        }
    }
}

/// Wire shape of a record as the parser emits it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawRecord {
    #[serde(rename = "type")]
    signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    form_id: Option<FormId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cell_id: Option<FormId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    references: Vec<FormId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<FormId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    objectives: Vec<QuestObjective>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    prerequisites: Vec<QuestPrerequisite>,
}

impl From<RawRecord> for EspRecord {
    fn from(raw: RawRecord) -> Self {
        let signature = raw.signature.trim().to_uppercase();
        if signature == "QUST" {
            return EspRecord::Quest(QuestRecord {
                form_id: raw.form_id,
                name: raw.name.unwrap_or_else(|| "Unknown Quest".to_string()),
                objectives: raw.objectives,
                prerequisites: raw.prerequisites,
            });
        }

        let linked = LinkedRecord {
            signature,
            form_id: raw.form_id,
            cell_id: raw.cell_id,
            references: raw.references,
            dependencies: raw.dependencies,
        };
        match linked.signature.as_str() {
            "CELL" | "WRLD" => EspRecord::Cell(linked),
            "REFR" | "ACHR" => EspRecord::Reference(linked),
            _ => EspRecord::Other(linked),
        }
    }
}

impl From<EspRecord> for RawRecord {
    fn from(record: EspRecord) -> Self {
        match record {
            EspRecord::Quest(quest) => RawRecord {
                signature: "QUST".to_string(),
                form_id: quest.form_id,
                name: Some(quest.name),
                objectives: quest.objectives,
                prerequisites: quest.prerequisites,
                ..Default::default()
            },
            EspRecord::Cell(linked) | EspRecord::Reference(linked) | EspRecord::Other(linked) => {
                RawRecord {
                    signature: linked.signature,
                    form_id: linked.form_id,
                    cell_id: linked.cell_id,
                    references: linked.references,
                    dependencies: linked.dependencies,
                    ..Default::default()
                }
            }
        }
    }
}
