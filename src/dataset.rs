use crate::config::DatasetConfig;
use crate::warehouse::TableRef;

/// Static knowledge about the one table this service answers questions over.
///
/// The prompts lean on this: the insight stage gets the column descriptions,
/// the SQL generator gets the field notes, and every stage gets the fully
/// qualified table reference.
#[derive(Debug, Clone)]
pub struct DatasetProfile {
    pub table: TableRef,
    /// Per-column descriptions, one `- name (TYPE): text` line each.
    pub column_descriptions: String,
    /// Usage guidance for the SQL generator prompt.
    pub field_notes: String,
}

impl DatasetProfile {
    pub fn from_config(config: &DatasetConfig) -> Self {
        Self {
            table: TableRef {
                project: config.project_id.clone(),
                dataset: config.dataset_id.clone(),
                table: config.table_name.clone(),
            },
            column_descriptions: SF311_COLUMN_DESCRIPTIONS.to_string(),
            field_notes: SF311_FIELD_NOTES.to_string(),
        }
    }

    /// `project.dataset.table`, the form queries reference.
    pub fn qualified_table(&self) -> String {
        self.table.qualified()
    }
}

const SF311_COLUMN_DESCRIPTIONS: &str = "\
- service_request_id (STRING): Unique identifier for the request
- status (STRING): Current status of the request (e.g., open, closed)
- status_notes (STRING): Additional status details
- agency_responsible (STRING): Department handling the request
- service_name (STRING): Type of city service requested
- service_subtype (STRING): More specific category of the request
- requested_datetime (TIMESTAMP): Time when the request was created
- updated_datetime (TIMESTAMP): Last update timestamp
- expected_datetime (TIMESTAMP): Expected resolution date
- closed_date (TIMESTAMP): When the request was marked as closed
- address (STRING): Request location
- street (STRING): Street name
- supervisor_district (STRING): Supervisor district of the address
- neighborhood (STRING): Neighborhood in San Francisco
- point (GEOGRAPHY): Geographical coordinates
- source (STRING): How the request was submitted (e.g., mobile app, phone)
- media_url (STRING): Link to media related to the request
- lat (FLOAT64): Latitude
- long (FLOAT64): Longitude
- created_at (TIMESTAMP): When the record was added
- closed_at (TIMESTAMP): When the request was closed (duplicate of closed_date)";

const SF311_FIELD_NOTES: &str = "\
- `service_request_id`: unique request ID
- `service_name`: high-level service category (e.g., \"Street and Sidewalk\")
- `service_subtype`: specific issue (e.g., \"Pothole\")
- `created_at`: when the request was made
- `closed_date`: when the request was resolved
- `status`: request status (\"Open\", \"Closed\", etc.)
- `agency_responsible`: agency assigned to the request
- `source`: submission channel (\"Mobile App\", \"Phone\", etc.)
- `neighborhood`: name of the neighborhood
- `address`: address of the request
- `lat` and `long`: coordinates";
