use crate::error::{FlowError, FlowResult};
use crate::token::Payload;
use std::collections::BTreeMap;
use std::fmt;

/// A bundle of named values with a fixed, declared set of field names.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    kind: String,
    allowed: Vec<String>,
    required: Vec<String>,
    values: BTreeMap<String, Payload>,
}

impl Container {
    pub fn new(kind: impl Into<String>, allowed: &[&str], required: &[&str]) -> Self {
        Self {
            kind: kind.into(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            required: required.iter().map(|s| s.to_string()).collect(),
            values: BTreeMap::new(),
        }
    }

    /// Trained model plus the (optional) dataset header it was built on.
    pub fn model() -> Self {
        Self::new("ModelContainer", &["Model", "Header"], &["Model"])
    }

    pub fn classification() -> Self {
        Self::new(
            "ClassificationContainer",
            &["Instance", "Classification", "Label", "Distribution"],
            &["Instance", "Classification"],
        )
    }

    pub fn clustering() -> Self {
        Self::new(
            "ClusteringContainer",
            &["Instance", "Cluster", "Distribution"],
            &["Instance", "Cluster"],
        )
    }

    pub fn attribute_selection() -> Self {
        Self::new(
            "AttributeSelectionContainer",
            &["Original", "Reduced", "NumAttributes", "Selected", "Results"],
            &["Reduced", "NumAttributes", "Selected"],
        )
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    pub fn allows(&self, name: &str) -> bool {
        self.allowed.iter().any(|a| a == name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Payload>) -> FlowResult<()> {
        if !self.allows(name) {
            return Err(FlowError::execution(format!(
                "'{name}' is not a field of {} (allowed: {})",
                self.kind,
                self.allowed.join(", ")
            )));
        }
        self.values.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn with(mut self, name: &str, value: impl Into<Payload>) -> FlowResult<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Payload> {
        self.values.get(name)
    }

    pub fn is_valid(&self) -> bool {
        self.required.iter().all(|r| self.values.contains_key(r))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Payload)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.kind)?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_undeclared_field() {
        let mut container = Container::model();
        assert!(container.set("Model", "J48").is_ok());
        let err = container.set("Accuracy", 0.9).unwrap_err();
        assert!(err.message().contains("not a field of ModelContainer"));
    }

    #[test]
    fn test_validity_follows_required_fields() {
        let container = Container::classification();
        assert!(!container.is_valid());
        let container = container
            .with("Instance", "row-1")
            .and_then(|c| c.with("Classification", 1.0))
            .unwrap();
        assert!(container.is_valid());
        assert_eq!(
            container.to_string(),
            "ClassificationContainer{Classification: 1.0, Instance: row-1}"
        );
    }
}
