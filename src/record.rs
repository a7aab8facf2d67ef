use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::normalize::normalize;

/// Identifier of a column of the hosted permit table.
///
/// The order of [`ColumnId::ALL`] is the canonical display and export order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnId {
    Year,
    OrderNumber,
    Annex,
    Authorization,
    Type,
    CaseNumber,
    Unit,
    LegalBasis,
    Level,
    Sponsor,
    Enterprise,
    EnterpriseType,
    Project,
    LeadArchaeologists,
    FieldArchaeologists,
    InstitutionalSupport,
    InstitutionState,
    InstitutionName,
    InstitutionContact,
    LocalEndorsement,
    Municipalities,
    States,
    GrantDate,
    ValidityPeriod,
    ExpirationDate,
}

impl ColumnId {
    pub const ALL: [ColumnId; 25] = [
        ColumnId::Year,
        ColumnId::OrderNumber,
        ColumnId::Annex,
        ColumnId::Authorization,
        ColumnId::Type,
        ColumnId::CaseNumber,
        ColumnId::Unit,
        ColumnId::LegalBasis,
        ColumnId::Level,
        ColumnId::Sponsor,
        ColumnId::Enterprise,
        ColumnId::EnterpriseType,
        ColumnId::Project,
        ColumnId::LeadArchaeologists,
        ColumnId::FieldArchaeologists,
        ColumnId::InstitutionalSupport,
        ColumnId::InstitutionState,
        ColumnId::InstitutionName,
        ColumnId::InstitutionContact,
        ColumnId::LocalEndorsement,
        ColumnId::Municipalities,
        ColumnId::States,
        ColumnId::GrantDate,
        ColumnId::ValidityPeriod,
        ColumnId::ExpirationDate,
    ];

    /// Column name on the remote table.
    pub fn id(&self) -> &'static str {
        match self {
            ColumnId::Year => "ano",
            ColumnId::OrderNumber => "portaria",
            ColumnId::Annex => "anexo",
            ColumnId::Authorization => "autorizacao",
            ColumnId::Type => "tipo",
            ColumnId::CaseNumber => "processo",
            ColumnId::Unit => "unidade",
            ColumnId::LegalBasis => "natureza",
            ColumnId::Level => "nivel_in",
            ColumnId::Sponsor => "empreendedor",
            ColumnId::Enterprise => "empreendimento",
            ColumnId::EnterpriseType => "tipo_empreendimento",
            ColumnId::Project => "projeto",
            ColumnId::LeadArchaeologists => "coordenador_geral",
            ColumnId::FieldArchaeologists => "coordenador_campo",
            ColumnId::InstitutionalSupport => "apoios_institucionais",
            ColumnId::InstitutionState => "uf",
            ColumnId::InstitutionName => "nome_atual_instituicao",
            ColumnId::InstitutionContact => "responsavel",
            ColumnId::LocalEndorsement => "endosso_na_uf",
            ColumnId::Municipalities => "municipios",
            ColumnId::States => "estados",
            ColumnId::GrantDate => "outorga",
            ColumnId::ValidityPeriod => "prazo",
            ColumnId::ExpirationDate => "validade",
        }
    }

    /// Human readable header.
    pub fn label(&self) -> &'static str {
        match self {
            ColumnId::Year => "Year",
            ColumnId::OrderNumber => "Ordinance",
            ColumnId::Annex => "Annex",
            ColumnId::Authorization => "Authorization",
            ColumnId::Type => "Type",
            ColumnId::CaseNumber => "Case number",
            ColumnId::Unit => "Issuing unit",
            ColumnId::LegalBasis => "Legal basis",
            ColumnId::Level => "Level",
            ColumnId::Sponsor => "Project sponsor",
            ColumnId::Enterprise => "Enterprise",
            ColumnId::EnterpriseType => "Enterprise type",
            ColumnId::Project => "Project",
            ColumnId::LeadArchaeologists => "Lead archaeologists",
            ColumnId::FieldArchaeologists => "Field archaeologists",
            ColumnId::InstitutionalSupport => "Institutional support",
            ColumnId::InstitutionState => "Institution state",
            ColumnId::InstitutionName => "Current institution name",
            ColumnId::InstitutionContact => "Institution contact",
            ColumnId::LocalEndorsement => "Local endorsement",
            ColumnId::Municipalities => "Municipalities",
            ColumnId::States => "States",
            ColumnId::GrantDate => "Grant date",
            ColumnId::ValidityPeriod => "Validity period",
            ColumnId::ExpirationDate => "Expiration date",
        }
    }

    /// Resolves a remote column name or a header label (accent and case insensitive).
    pub fn parse(name: &str) -> Option<ColumnId> {
        let wanted = normalize(name);
        ColumnId::ALL
            .into_iter()
            .find(|c| c.id() == wanted || normalize(c.label()) == wanted)
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Columns matched by the client side free text search.
pub const SEARCH_COLUMNS: [ColumnId; 17] = [
    ColumnId::Year,
    ColumnId::OrderNumber,
    ColumnId::CaseNumber,
    ColumnId::Unit,
    ColumnId::Project,
    ColumnId::Sponsor,
    ColumnId::Enterprise,
    ColumnId::EnterpriseType,
    ColumnId::LegalBasis,
    ColumnId::LeadArchaeologists,
    ColumnId::FieldArchaeologists,
    ColumnId::InstitutionalSupport,
    ColumnId::Municipalities,
    ColumnId::States,
    ColumnId::GrantDate,
    ColumnId::ExpirationDate,
    ColumnId::Type,
];

/// Columns most searches hit, checked before the full list.
pub const PRIORITY_SEARCH_COLUMNS: [ColumnId; 8] = [
    ColumnId::OrderNumber,
    ColumnId::CaseNumber,
    ColumnId::Sponsor,
    ColumnId::Enterprise,
    ColumnId::Project,
    ColumnId::LeadArchaeologists,
    ColumnId::FieldArchaeologists,
    ColumnId::Municipalities,
];

/// Columns searched on the server. `ano` is an integer column and cannot be pattern matched.
pub fn remote_search_columns() -> Vec<ColumnId> {
    SEARCH_COLUMNS
        .into_iter()
        .filter(|c| *c != ColumnId::Year)
        .collect()
}

/// A column as it can be shown or exported: a table column or the derived status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewColumn {
    Status,
    Field(ColumnId),
}

impl ViewColumn {
    pub fn id(&self) -> &'static str {
        match self {
            ViewColumn::Status => "status_portaria",
            ViewColumn::Field(c) => c.id(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ViewColumn::Status => "Status",
            ViewColumn::Field(c) => c.label(),
        }
    }

    pub fn parse(name: &str) -> Option<ViewColumn> {
        let wanted = normalize(name);
        if wanted == "status_portaria" || wanted == "status" {
            return Some(ViewColumn::Status);
        }
        ColumnId::parse(name).map(ViewColumn::Field)
    }

    /// Every selectable column, status last as in the column chooser.
    pub fn all() -> Vec<ViewColumn> {
        ColumnId::ALL
            .into_iter()
            .map(ViewColumn::Field)
            .chain(std::iter::once(ViewColumn::Status))
            .collect()
    }
}

/// Set of columns the user wants to see. Selection order is kept but never
/// used for display, see [`ColumnSelection::ordered`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSelection {
    selected: Vec<ViewColumn>,
}

impl Default for ColumnSelection {
    fn default() -> Self {
        Self {
            selected: vec![
                ViewColumn::Field(ColumnId::Year),
                ViewColumn::Field(ColumnId::OrderNumber),
                ViewColumn::Field(ColumnId::CaseNumber),
                ViewColumn::Field(ColumnId::Unit),
                ViewColumn::Field(ColumnId::LeadArchaeologists),
                ViewColumn::Field(ColumnId::FieldArchaeologists),
                ViewColumn::Field(ColumnId::GrantDate),
                ViewColumn::Field(ColumnId::ValidityPeriod),
                ViewColumn::Field(ColumnId::ExpirationDate),
                ViewColumn::Field(ColumnId::Type),
                ViewColumn::Status,
            ],
        }
    }
}

impl ColumnSelection {
    pub fn new(columns: impl IntoIterator<Item = ViewColumn>) -> Self {
        let mut selection = Self {
            selected: Vec::new(),
        };
        for c in columns {
            if !selection.contains(c) {
                selection.selected.push(c);
            }
        }
        selection
    }

    pub fn contains(&self, column: ViewColumn) -> bool {
        self.selected.contains(&column)
    }

    pub fn toggle(&mut self, column: ViewColumn) {
        if let Some(pos) = self.selected.iter().position(|&c| c == column) {
            self.selected.remove(pos);
        } else {
            self.selected.push(column);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Display order: status first when selected, then the master column order.
    pub fn ordered(&self) -> Vec<ViewColumn> {
        let status = self
            .contains(ViewColumn::Status)
            .then_some(ViewColumn::Status);
        status
            .into_iter()
            .chain(
                ColumnId::ALL
                    .into_iter()
                    .map(ViewColumn::Field)
                    .filter(|c| self.contains(*c)),
            )
            .collect()
    }
}

/// One permit row of the hosted table. Every attribute may be absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Record {
    #[serde(default, deserialize_with = "lenient_int")]
    pub id: Option<i64>,
    #[serde(rename = "ano", default, deserialize_with = "lenient_int")]
    pub year: Option<i64>,
    #[serde(rename = "portaria", default, deserialize_with = "lenient_string")]
    pub order_number: Option<String>,
    #[serde(rename = "anexo", default, deserialize_with = "lenient_string")]
    pub annex: Option<String>,
    #[serde(rename = "autorizacao", default, deserialize_with = "lenient_string")]
    pub authorization: Option<String>,
    #[serde(rename = "tipo", default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(rename = "processo", default, deserialize_with = "lenient_string")]
    pub case_number: Option<String>,
    #[serde(rename = "unidade", default, deserialize_with = "lenient_string")]
    pub unit: Option<String>,
    #[serde(rename = "natureza", default, deserialize_with = "lenient_string")]
    pub legal_basis: Option<String>,
    #[serde(rename = "nivel_in", default, deserialize_with = "lenient_string")]
    pub level: Option<String>,
    #[serde(rename = "empreendedor", default, deserialize_with = "lenient_string")]
    pub sponsor: Option<String>,
    #[serde(rename = "empreendimento", default, deserialize_with = "lenient_string")]
    pub enterprise: Option<String>,
    #[serde(rename = "tipo_empreendimento", default, deserialize_with = "lenient_string")]
    pub enterprise_type: Option<String>,
    #[serde(rename = "projeto", default, deserialize_with = "lenient_string")]
    pub project: Option<String>,
    #[serde(rename = "coordenador_geral", default, deserialize_with = "lenient_string")]
    pub lead_archaeologists: Option<String>,
    #[serde(rename = "coordenador_campo", default, deserialize_with = "lenient_string")]
    pub field_archaeologists: Option<String>,
    #[serde(rename = "apoios_institucionais", default, deserialize_with = "lenient_string")]
    pub institutional_support: Option<String>,
    #[serde(rename = "uf", default, deserialize_with = "lenient_string")]
    pub institution_state: Option<String>,
    #[serde(rename = "nome_atual_instituicao", default, deserialize_with = "lenient_string")]
    pub institution_name: Option<String>,
    #[serde(rename = "responsavel", default, deserialize_with = "lenient_string")]
    pub institution_contact: Option<String>,
    #[serde(rename = "endosso_na_uf", default, deserialize_with = "lenient_string")]
    pub local_endorsement: Option<String>,
    #[serde(rename = "municipios", default, deserialize_with = "lenient_string")]
    pub municipalities: Option<String>,
    #[serde(rename = "estados", default, deserialize_with = "lenient_string")]
    pub states: Option<String>,
    #[serde(rename = "outorga", default, deserialize_with = "lenient_string")]
    pub grant_date: Option<String>,
    #[serde(rename = "prazo", default, deserialize_with = "lenient_string")]
    pub validity_period: Option<String>,
    #[serde(rename = "validade", default, deserialize_with = "lenient_string")]
    pub expiration_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub updated_at: Option<String>,
}

impl Record {
    // Text columns only, the year is stored as an integer.
    fn slot(&self, column: ColumnId) -> Option<&Option<String>> {
        Some(match column {
            ColumnId::Year => return None,
            ColumnId::OrderNumber => &self.order_number,
            ColumnId::Annex => &self.annex,
            ColumnId::Authorization => &self.authorization,
            ColumnId::Type => &self.kind,
            ColumnId::CaseNumber => &self.case_number,
            ColumnId::Unit => &self.unit,
            ColumnId::LegalBasis => &self.legal_basis,
            ColumnId::Level => &self.level,
            ColumnId::Sponsor => &self.sponsor,
            ColumnId::Enterprise => &self.enterprise,
            ColumnId::EnterpriseType => &self.enterprise_type,
            ColumnId::Project => &self.project,
            ColumnId::LeadArchaeologists => &self.lead_archaeologists,
            ColumnId::FieldArchaeologists => &self.field_archaeologists,
            ColumnId::InstitutionalSupport => &self.institutional_support,
            ColumnId::InstitutionState => &self.institution_state,
            ColumnId::InstitutionName => &self.institution_name,
            ColumnId::InstitutionContact => &self.institution_contact,
            ColumnId::LocalEndorsement => &self.local_endorsement,
            ColumnId::Municipalities => &self.municipalities,
            ColumnId::States => &self.states,
            ColumnId::GrantDate => &self.grant_date,
            ColumnId::ValidityPeriod => &self.validity_period,
            ColumnId::ExpirationDate => &self.expiration_date,
        })
    }

    fn slot_mut(&mut self, column: ColumnId) -> Option<&mut Option<String>> {
        Some(match column {
            ColumnId::Year => return None,
            ColumnId::OrderNumber => &mut self.order_number,
            ColumnId::Annex => &mut self.annex,
            ColumnId::Authorization => &mut self.authorization,
            ColumnId::Type => &mut self.kind,
            ColumnId::CaseNumber => &mut self.case_number,
            ColumnId::Unit => &mut self.unit,
            ColumnId::LegalBasis => &mut self.legal_basis,
            ColumnId::Level => &mut self.level,
            ColumnId::Sponsor => &mut self.sponsor,
            ColumnId::Enterprise => &mut self.enterprise,
            ColumnId::EnterpriseType => &mut self.enterprise_type,
            ColumnId::Project => &mut self.project,
            ColumnId::LeadArchaeologists => &mut self.lead_archaeologists,
            ColumnId::FieldArchaeologists => &mut self.field_archaeologists,
            ColumnId::InstitutionalSupport => &mut self.institutional_support,
            ColumnId::InstitutionState => &mut self.institution_state,
            ColumnId::InstitutionName => &mut self.institution_name,
            ColumnId::InstitutionContact => &mut self.institution_contact,
            ColumnId::LocalEndorsement => &mut self.local_endorsement,
            ColumnId::Municipalities => &mut self.municipalities,
            ColumnId::States => &mut self.states,
            ColumnId::GrantDate => &mut self.grant_date,
            ColumnId::ValidityPeriod => &mut self.validity_period,
            ColumnId::ExpirationDate => &mut self.expiration_date,
        })
    }

    /// Raw value of a column. Empty strings are returned as they are.
    pub fn get(&self, column: ColumnId) -> Option<Cow<'_, str>> {
        match column {
            ColumnId::Year => self.year.map(|y| Cow::Owned(y.to_string())),
            c => self.slot(c).and_then(|v| v.as_deref()).map(Cow::Borrowed),
        }
    }

    /// Trimmed value of a column, `None` when absent or blank ("not informed").
    pub fn informed(&self, column: ColumnId) -> Option<String> {
        self.get(column)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Sets a column from text. A year that is not an integer is dropped.
    pub fn set(&mut self, column: ColumnId, value: Option<String>) {
        match column {
            ColumnId::Year => self.year = value.and_then(|v| v.trim().parse().ok()),
            c => {
                if let Some(slot) = self.slot_mut(c) {
                    *slot = value;
                }
            }
        }
    }

    /// Builder style [`Record::set`].
    pub fn with(mut self, column: ColumnId, value: &str) -> Self {
        self.set(column, Some(value.to_string()));
        self
    }

    /// Space joined text of the given columns, absent values skipped.
    pub fn joined(&self, columns: &[ColumnId]) -> String {
        columns
            .iter()
            .filter_map(|&c| self.get(c))
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    })
}

fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_remote_row() {
        let row = r#"{"id": 7, "ano": "2021", "portaria": 45, "tipo": null,
                      "validade": "01/01/2030", "unknown_column": [1, 2]}"#;
        let record: Record = serde_json::from_str(row).unwrap();
        assert_eq!(record.id, Some(7));
        assert_eq!(record.year, Some(2021));
        assert_eq!(record.order_number.as_deref(), Some("45"));
        assert_eq!(record.kind, None);
        assert_eq!(record.get(ColumnId::ExpirationDate).as_deref(), Some("01/01/2030"));
        assert_eq!(record.get(ColumnId::Year).as_deref(), Some("2021"));
    }

    #[test]
    fn informed_treats_blank_as_missing() {
        let record = Record::default().with(ColumnId::Unit, "   ");
        assert_eq!(record.get(ColumnId::Unit).as_deref(), Some("   "));
        assert_eq!(record.informed(ColumnId::Unit), None);
        assert_eq!(record.informed(ColumnId::Year), None);
    }

    #[test]
    fn parse_by_id_or_label() {
        assert_eq!(ColumnId::parse("tipo_empreendimento"), Some(ColumnId::EnterpriseType));
        assert_eq!(ColumnId::parse("Enterprise Type"), Some(ColumnId::EnterpriseType));
        assert_eq!(ColumnId::parse("nope"), None);
        assert_eq!(ViewColumn::parse("status_portaria"), Some(ViewColumn::Status));
    }

    #[test]
    fn selection_orders_by_master_list_with_status_first() {
        let selection = ColumnSelection::new([
            ViewColumn::Field(ColumnId::ExpirationDate),
            ViewColumn::Field(ColumnId::Year),
            ViewColumn::Status,
            ViewColumn::Field(ColumnId::Type),
        ]);
        assert_eq!(
            selection.ordered(),
            vec![
                ViewColumn::Status,
                ViewColumn::Field(ColumnId::Year),
                ViewColumn::Field(ColumnId::Type),
                ViewColumn::Field(ColumnId::ExpirationDate),
            ]
        );
    }

    #[test]
    fn toggle_adds_and_removes() {
        let mut selection = ColumnSelection::new([]);
        selection.toggle(ViewColumn::Status);
        assert!(selection.contains(ViewColumn::Status));
        selection.toggle(ViewColumn::Status);
        assert!(selection.is_empty());
    }

    #[test]
    fn joined_skips_absent_values() {
        let record = Record::default()
            .with(ColumnId::OrderNumber, "12")
            .with(ColumnId::Project, "Survey");
        assert_eq!(
            record.joined(&[ColumnId::OrderNumber, ColumnId::Sponsor, ColumnId::Project]),
            "12 Survey"
        );
    }
}
