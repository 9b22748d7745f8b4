//! W-2 wage and tax statement extraction.

use serde::{Deserialize, Serialize};

use super::{match_fields, ExtractedFields, FieldExtractor, FieldFormat, FieldRule, FieldValue};
use crate::blocks::BlockGraph;
use crate::document::DocumentType;

// Bare box numbers ("box 1") are left out: "box 1" is a substring of "box 12".
const W2_RULES: &[FieldRule] = &[
    FieldRule {
        name: "employee_ssn",
        phrases: &["employee's social security number", "social security number", "employee ssn", "ssn"],
        format: FieldFormat::Ssn,
    },
    FieldRule {
        name: "employee_name",
        phrases: &["employee's first name", "employee's name", "employee name"],
        format: FieldFormat::Text,
    },
    FieldRule {
        name: "employee_address",
        phrases: &["employee's address", "employee address"],
        format: FieldFormat::Text,
    },
    FieldRule {
        name: "employer_ein",
        phrases: &["employer identification number", "employer identification", "employer ein", "ein"],
        format: FieldFormat::Ein,
    },
    FieldRule {
        name: "employer_name",
        phrases: &["employer's name", "employer name", "company name"],
        format: FieldFormat::Text,
    },
    FieldRule {
        name: "employer_address",
        phrases: &["employer's address", "employer address", "company address"],
        format: FieldFormat::Text,
    },
    FieldRule {
        name: "wages",
        phrases: &["wages, tips, other compensation", "wages, tips", "wages tips", "total wages"],
        format: FieldFormat::Money,
    },
    FieldRule {
        name: "federal_tax_withheld",
        phrases: &["federal income tax withheld", "federal income tax", "federal tax"],
        format: FieldFormat::Money,
    },
    FieldRule {
        name: "social_security_wages",
        phrases: &["social security wages"],
        format: FieldFormat::Money,
    },
    FieldRule {
        name: "social_security_tax_withheld",
        phrases: &["social security tax withheld", "social security tax"],
        format: FieldFormat::Money,
    },
    FieldRule {
        name: "medicare_wages",
        phrases: &["medicare wages and tips", "medicare wages"],
        format: FieldFormat::Money,
    },
    FieldRule {
        name: "medicare_tax_withheld",
        phrases: &["medicare tax withheld", "medicare tax"],
        format: FieldFormat::Money,
    },
];

/// Canonical W-2 fields. Unset fields serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct W2Fields {
    #[serde(default, deserialize_with = "super::format::text_field")]
    pub employee_ssn: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::text_field")]
    pub employee_name: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::text_field")]
    pub employee_address: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::text_field")]
    pub employer_ein: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::text_field")]
    pub employer_name: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::text_field")]
    pub employer_address: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::amount_field")]
    pub wages: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::amount_field")]
    pub federal_tax_withheld: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::amount_field")]
    pub social_security_wages: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::amount_field")]
    pub social_security_tax_withheld: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::amount_field")]
    pub medicare_wages: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::amount_field")]
    pub medicare_tax_withheld: Option<FieldValue>,
}

impl W2Fields {
    pub fn entries(&self) -> Vec<(&'static str, Option<&FieldValue>)> {
        vec![
            ("employee_ssn", self.employee_ssn.as_ref()),
            ("employee_name", self.employee_name.as_ref()),
            ("employee_address", self.employee_address.as_ref()),
            ("employer_ein", self.employer_ein.as_ref()),
            ("employer_name", self.employer_name.as_ref()),
            ("employer_address", self.employer_address.as_ref()),
            ("wages", self.wages.as_ref()),
            ("federal_tax_withheld", self.federal_tax_withheld.as_ref()),
            ("social_security_wages", self.social_security_wages.as_ref()),
            (
                "social_security_tax_withheld",
                self.social_security_tax_withheld.as_ref(),
            ),
            ("medicare_wages", self.medicare_wages.as_ref()),
            ("medicare_tax_withheld", self.medicare_tax_withheld.as_ref()),
        ]
    }
}

/// Extractor for Form W-2.
#[derive(Debug, Clone, Copy, Default)]
pub struct W2Extractor;

impl FieldExtractor for W2Extractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::W2
    }

    fn extract(&self, graph: &BlockGraph) -> ExtractedFields {
        let pairs = graph.key_value_pairs();
        let mut found = match_fields(&pairs, W2_RULES);

        ExtractedFields::W2(W2Fields {
            employee_ssn: found.take("employee_ssn"),
            employee_name: found.take("employee_name"),
            employee_address: found.take("employee_address"),
            employer_ein: found.take("employer_ein"),
            employer_name: found.take("employer_name"),
            employer_address: found.take("employer_address"),
            wages: found.take("wages"),
            federal_tax_withheld: found.take("federal_tax_withheld"),
            social_security_wages: found.take("social_security_wages"),
            social_security_tax_withheld: found.take("social_security_tax_withheld"),
            medicare_wages: found.take("medicare_wages"),
            medicare_tax_withheld: found.take("medicare_tax_withheld"),
        })
    }
}
