use crate::models::{ColumnInfo, TableInfo};

/// Compact column catalog for the FHIR Synthea tables.
///
/// Date-like fields in this dataset are stored as STRING, which is why the
/// prompt and the column classifier both treat names and values, not just
/// declared types, as temporal evidence.
const TABLES: &[(&str, &[(&str, &str)])] = &[
    (
        "patient",
        &[
            ("id", "STRING"),
            ("gender", "STRING"),
            ("birthDate", "STRING"),
            ("deceasedDateTime", "STRING"),
            ("maritalStatus", "RECORD"),
            ("name", "RECORD"),
            ("address", "RECORD"),
        ],
    ),
    (
        "observation",
        &[
            ("id", "STRING"),
            ("status", "STRING"),
            ("code", "RECORD"),
            ("subject", "RECORD"),
            ("context", "RECORD"),
            ("effectiveDateTime", "STRING"),
            ("issued", "STRING"),
            ("valueQuantity", "RECORD"),
            ("valueString", "STRING"),
        ],
    ),
    (
        "condition",
        &[
            ("id", "STRING"),
            ("clinicalStatus", "STRING"),
            ("verificationStatus", "STRING"),
            ("code", "RECORD"),
            ("subject", "RECORD"),
            ("context", "RECORD"),
            ("onsetDateTime", "STRING"),
            ("assertedDate", "STRING"),
            ("abatementDateTime", "STRING"),
        ],
    ),
    (
        "procedure",
        &[
            ("id", "STRING"),
            ("status", "STRING"),
            ("code", "RECORD"),
            ("subject", "RECORD"),
            ("context", "RECORD"),
            ("performedPeriod", "RECORD"),
        ],
    ),
    (
        "medication_request",
        &[
            ("id", "STRING"),
            ("status", "STRING"),
            ("intent", "STRING"),
            ("medication", "RECORD"),
            ("subject", "RECORD"),
            ("context", "RECORD"),
            ("authoredOn", "STRING"),
        ],
    ),
    (
        "encounter",
        &[
            ("id", "STRING"),
            ("status", "STRING"),
            ("class", "RECORD"),
            ("type", "RECORD"),
            ("subject", "RECORD"),
            ("period", "RECORD"),
            ("serviceProvider", "RECORD"),
        ],
    ),
    (
        "organization",
        &[
            ("id", "STRING"),
            ("name", "STRING"),
            ("type", "RECORD"),
            ("address", "RECORD"),
        ],
    ),
    (
        "practitioner",
        &[
            ("id", "STRING"),
            ("name", "RECORD"),
            ("gender", "STRING"),
            ("address", "RECORD"),
        ],
    ),
];

/// Table purposes shown to the model alongside the column catalog
const TABLE_PURPOSES: &[(&str, &str)] = &[
    ("patient", "Patient demographics and basic information"),
    ("observation", "Clinical observations and measurements"),
    ("condition", "Medical conditions and diagnoses"),
    ("procedure", "Medical procedures performed"),
    ("medication_request", "Medications prescribed"),
    ("encounter", "Healthcare encounters/visits"),
    ("organization", "Healthcare organizations"),
    ("practitioner", "Healthcare providers"),
];

/// Immutable table catalog shared across requests
#[derive(Debug, Clone)]
pub struct SchemaContext {
    pub dataset: String,
    pub tables: Vec<TableInfo>,
}

impl SchemaContext {
    /// Catalog of the FHIR Synthea tables under the given dataset id
    pub fn fhir_synthea(dataset: impl Into<String>) -> Self {
        let tables = TABLES
            .iter()
            .map(|(name, columns)| TableInfo {
                name: (*name).to_string(),
                columns: columns
                    .iter()
                    .map(|(col, ty)| ColumnInfo {
                        name: (*col).to_string(),
                        column_type: (*ty).to_string(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            dataset: dataset.into(),
            tables,
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }

    /// Render the catalog as the prompt's schema section
    pub fn prompt_block(&self) -> String {
        let mut block = String::new();
        for table in &self.tables {
            let purpose = TABLE_PURPOSES
                .iter()
                .find(|(name, _)| *name == table.name)
                .map(|(_, purpose)| *purpose)
                .unwrap_or("");
            block.push_str(&format!("- {}: {}\n", table.name, purpose));
            for column in &table.columns {
                block.push_str(&format!("    {} ({})\n", column.name, column.column_type));
            }
        }
        block
    }
}
