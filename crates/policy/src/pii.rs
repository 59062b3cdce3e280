//! PII entity detection and redaction.

use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Kinds of personal data redacted from model output.
///
/// Variant order is the order redaction runs in: the more specific
/// numeric shapes go before the phone pattern, which would otherwise
/// swallow parts of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiEntity {
    EmailAddress,
    CreditCard,
    UsSsn,
    IpAddress,
    PhoneNumber,
}

impl PiiEntity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmailAddress => "EMAIL_ADDRESS",
            Self::CreditCard => "CREDIT_CARD",
            Self::UsSsn => "US_SSN",
            Self::IpAddress => "IP_ADDRESS",
            Self::PhoneNumber => "PHONE_NUMBER",
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            Self::EmailAddress => r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            Self::CreditCard => r"\b(?:\d{4}[ -]?){3}\d{1,4}\b",
            Self::UsSsn => r"\b\d{3}-\d{2}-\d{4}\b",
            Self::IpAddress => r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
            Self::PhoneNumber => {
                r"(?:\+?\d{1,2}[\s.-]?)?(?:\(\d{3}\)|\b\d{3})[\s.-]?\d{3}[\s.-]\d{4}\b"
            }
        }
    }

    /// The placeholder substituted for a match, e.g. `<EMAIL_ADDRESS>`.
    pub fn placeholder(self) -> String {
        format!("<{}>", self.as_str())
    }
}

impl FromStr for PiiEntity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EMAIL_ADDRESS" => Ok(Self::EmailAddress),
            "CREDIT_CARD" => Ok(Self::CreditCard),
            "US_SSN" => Ok(Self::UsSsn),
            "IP_ADDRESS" => Ok(Self::IpAddress),
            "PHONE_NUMBER" => Ok(Self::PhoneNumber),
            other => Err(Error::UnknownEntity(other.to_string())),
        }
    }
}

/// Compiled redactor for a set of entities.
#[derive(Debug, Clone, Default)]
pub struct PiiRedactor {
    detectors: Vec<(PiiEntity, Regex)>,
}

impl PiiRedactor {
    pub fn new(entities: impl IntoIterator<Item = PiiEntity>) -> crate::Result<Self> {
        let mut entities: Vec<PiiEntity> = entities.into_iter().collect();
        entities.sort();
        entities.dedup();

        let detectors = entities
            .into_iter()
            .map(|entity| Ok((entity, Regex::new(entity.pattern())?)))
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self { detectors })
    }

    /// Replace every detected entity with its placeholder.
    ///
    /// Returns the redacted text and the entity kinds that were found.
    pub fn redact(&self, text: &str) -> (String, Vec<PiiEntity>) {
        let mut output = text.to_string();
        let mut found = Vec::new();
        for (entity, regex) in &self.detectors {
            if regex.is_match(&output) {
                output = regex
                    .replace_all(&output, entity.placeholder().as_str())
                    .into_owned();
                found.push(*entity);
            }
        }
        (output, found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> PiiRedactor {
        PiiRedactor::new([
            PiiEntity::EmailAddress,
            PiiEntity::PhoneNumber,
            PiiEntity::UsSsn,
            PiiEntity::CreditCard,
            PiiEntity::IpAddress,
        ])
        .unwrap()
    }

    #[test]
    fn redacts_email() {
        let (text, found) = all().redact("Contact john@email.com for info.");
        assert_eq!(text, "Contact <EMAIL_ADDRESS> for info.");
        assert_eq!(found, [PiiEntity::EmailAddress]);
    }

    #[test]
    fn redacts_numeric_entities_without_overlap() {
        let (text, found) = all().redact(
            "SSN 123-45-6789, card 4111 1111 1111 1111, call 555-123-4567, host 10.0.0.1",
        );
        assert_eq!(
            text,
            "SSN <US_SSN>, card <CREDIT_CARD>, call <PHONE_NUMBER>, host <IP_ADDRESS>"
        );
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn only_configured_entities_are_redacted() {
        let redactor = PiiRedactor::new([PiiEntity::UsSsn]).unwrap();
        let (text, found) = redactor.redact("mail a@b.org, ssn 123-45-6789");
        assert_eq!(text, "mail a@b.org, ssn <US_SSN>");
        assert_eq!(found, [PiiEntity::UsSsn]);
    }

    #[test]
    fn parses_entity_names() {
        assert_eq!("US_SSN".parse::<PiiEntity>().unwrap(), PiiEntity::UsSsn);
        assert!("PASSPORT".parse::<PiiEntity>().is_err());
    }
}
