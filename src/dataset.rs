//! The four Pegasus datasets and their table configuration. The backend
//! serves each as an open column->value mapping; the column specs below
//! pick the fields worth a grid column and give them display labels.
//! Every other field still reaches the detail view and the full-text
//! search.

use crate::view::{Column, Row};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Sites,
    Trb,
    Pmwo,
    Swo,
}

impl Dataset {
    pub const ALL: [Dataset; 4] = [Dataset::Sites, Dataset::Trb, Dataset::Pmwo, Dataset::Swo];

    /// Position in [`Dataset::ALL`]; also the tab order.
    pub fn index(&self) -> usize {
        match self {
            Dataset::Sites => 0,
            Dataset::Trb => 1,
            Dataset::Pmwo => 2,
            Dataset::Swo => 3,
        }
    }

    /// Path segment under /api/v1.
    pub fn path(&self) -> &'static str {
        match self {
            Dataset::Sites => "sites",
            Dataset::Trb => "trb",
            Dataset::Pmwo => "pmwo",
            Dataset::Swo => "swo",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Dataset::Sites => "Sites",
            Dataset::Trb => "TRB",
            Dataset::Pmwo => "PMWO",
            Dataset::Swo => "SWO",
        }
    }

    /// Grid columns, in display order.
    pub fn columns(&self) -> Vec<Column> {
        match self {
            Dataset::Sites => vec![
                Column::new("site_id", "Site")
                    .with_width(22)
                    .with_accessor(site_label),
                Column::new("class", "Classe").with_width(8),
                Column::new("province", "Province").with_width(14),
                Column::new("zone", "Zone").with_width(10),
                Column::new("pm_cluster", "Cluster PM").with_width(12),
                Column::new("cm_cluster", "Cluster CM").with_width(12),
                Column::new("is_under_maintenance", "Maintenance").with_width(11),
                Column::new("has_genset", "GE").with_width(5),
                Column::new("tower_height", "Pylône")
                    .with_width(8)
                    .with_formatter(meters),
                Column::new("tenant_count", "Tenants").with_width(7),
                Column::new("energie", "Énergie").with_width(12),
            ],
            Dataset::Trb => vec![
                Column::new("trb_id", "TRB").with_width(12),
                Column::new("hts_sn_id", "Site").with_width(14),
                Column::new("severity", "Sévérité").with_width(9),
                Column::new("status", "Statut").with_width(10),
                Column::new("root_cause", "Cause").with_width(18),
                Column::new("opened_at", "Ouvert le").with_width(17),
                Column::new("closed_at", "Fermé le").with_width(17),
                Column::new("outage_duration_h", "Durée (h)").with_width(9),
            ],
            Dataset::Pmwo => vec![
                Column::new("pmwo_id", "PMWO").with_width(12),
                Column::new("site_id", "Site").with_width(14),
                Column::new("pm_cluster", "Cluster").with_width(12),
                Column::new("visit_type", "Visite").with_width(10),
                Column::new("planned_date", "Planifié").with_width(12),
                Column::new("executed_date", "Exécuté").with_width(12),
                Column::new("status", "Statut").with_width(10),
                Column::new("technician", "Technicien").with_width(16),
            ],
            Dataset::Swo => vec![
                Column::new("swo_id", "SWO").with_width(12),
                Column::new("site_id", "Site").with_width(14),
                Column::new("work_type", "Type").with_width(14),
                Column::new("status", "Statut").with_width(10),
                Column::new("vendor", "Prestataire").with_width(16),
                Column::new("created_at", "Créé le").with_width(12),
                Column::new("closed_at", "Clôturé le").with_width(12),
            ],
        }
    }

    /// Candidate group-by fields for the dashboard aggregates.
    pub fn group_fields(&self) -> &'static [&'static str] {
        match self {
            Dataset::Sites => &["province", "zone", "class", "typologie", "pm_cluster", "energie"],
            Dataset::Trb => &["severity", "status", "root_cause"],
            Dataset::Pmwo => &["status", "pm_cluster", "visit_type"],
            Dataset::Swo => &["status", "work_type", "vendor"],
        }
    }
}

/// Site rows are identified by both an internal id and a name; show them as
/// one grid cell.
fn site_label(row: &Row) -> Value {
    let id = row.get("site_id").and_then(Value::as_str).unwrap_or("");
    let name = row.get("site_name").and_then(Value::as_str).unwrap_or("");
    match (id.is_empty(), name.is_empty()) {
        (false, false) => Value::String(format!("{id} · {name}")),
        (false, true) => Value::String(id.to_string()),
        (true, _) => Value::String(name.to_string()),
    }
}

fn meters(value: &Value, _row: &Row) -> String {
    match value {
        Value::Number(n) => format!("{n} m"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_dataset_has_columns_and_group_fields() {
        for dataset in Dataset::ALL {
            assert!(!dataset.columns().is_empty());
            assert!(!dataset.group_fields().is_empty());
        }
    }

    #[test]
    fn site_label_joins_id_and_name() {
        let mut row = Row::new();
        row.insert("site_id".to_string(), json!("KIN001"));
        row.insert("site_name".to_string(), json!("Binza"));
        assert_eq!(site_label(&row), json!("KIN001 · Binza"));
        row.remove("site_name");
        assert_eq!(site_label(&row), json!("KIN001"));
    }
}
