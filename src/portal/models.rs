//! Response shapes of the portal's JSON endpoints.
//!
//! Amounts and quantities arrive as display strings (`"€ 1.234,56"`); they
//! are kept verbatim here and parsed by [`crate::normalize`].

use serde::{Deserialize, Deserializer};

/// Response from `ResultsOverview/GetResultHistory`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsHistoryResponse {
    #[serde(rename = "NoOfPages")]
    pub no_of_pages: u32,
    #[serde(default, rename = "ResultsHistoryItems")]
    pub items: Vec<ResultsHistoryItem>,
}

/// One security's aggregate over the requested year.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResultsHistoryItem {
    #[serde(rename = "SecurityId", deserialize_with = "string_or_number")]
    pub security_id: String,
    #[serde(rename = "SecurityName")]
    pub security_name: String,
    /// Dividend or result total, e.g. `"€ 12,34"`.
    #[serde(default, rename = "Total")]
    pub total: String,
    #[serde(default, rename = "RealizedResult")]
    pub realized_result: String,
}

/// Response from the position mutations endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionMutationsResponse {
    #[serde(rename = "NoOfPages")]
    pub no_of_pages: u32,
    #[serde(default, rename = "PositionMutationDetails")]
    pub mutations: Vec<PositionMutation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PositionMutation {
    /// `dd/mm/yyyy`
    #[serde(rename = "TransactionDate")]
    pub transaction_date: String,
    /// Dutch label such as `Aankoop`.
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Mutation")]
    pub mutation: String,
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "NewPosition")]
    pub new_position: String,
}

/// Security ids are numeric on some endpoints and strings on others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}
