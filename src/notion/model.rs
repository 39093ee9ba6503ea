use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Deserialize, Debug)]
pub struct DatabaseProperty {
    pub id: String,
    #[serde(rename = "type")]
    pub typ: String,
}

#[derive(Deserialize, Debug)]
pub struct RetrieveDatabaseResp {
    pub id: String,
    #[serde(default)]
    pub title: Vec<Value>,
    pub properties: HashMap<String, DatabaseProperty>,
}

impl RetrieveDatabaseResp {
    /// Configured property names that the database schema does not define.
    pub fn missing_properties<'a>(&self, names: &[&'a str]) -> Vec<&'a str> {
        names
            .iter()
            .copied()
            .filter(|name| !self.properties.contains_key(*name))
            .collect()
    }

    pub fn plain_title(&self) -> String {
        self.title
            .iter()
            .filter_map(|t| t.get("plain_text").and_then(Value::as_str))
            .collect()
    }
}

#[derive(Deserialize, Debug)]
pub struct PageRef {
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub struct QueryDatabaseResp {
    pub results: Vec<PageRef>,
}
